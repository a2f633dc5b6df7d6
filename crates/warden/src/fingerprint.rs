//! Short, non-reversible token identifiers for log correlation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// First 8 bytes of SHA-256(token), base64url encoded
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("03AFcWeA6-token");
        assert_eq!(a, token_fingerprint("03AFcWeA6-token"));
        assert_eq!(a.len(), 11);
        assert!(!a.contains("token"));
        assert_ne!(a, token_fingerprint("03AFcWeA6-other"));
    }
}
