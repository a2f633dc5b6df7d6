//! Core types shared across Warden components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// reCAPTCHA protocol variant
///
/// - V2: boolean pass/fail from the verifier
/// - V3: risk score plus an action label, compared against a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVersion {
    V2,
    V3,
}

impl ChallengeVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

impl std::fmt::Display for ChallengeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-domain secrets and policy
///
/// Camel-case aliases keep older JSON configuration files loadable; the
/// lowercase ones cover sources that fold key case.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPolicy {
    /// Suffix matched against the request origin
    pub name: String,

    #[serde(default, alias = "secretKeyV2", alias = "secretkeyv2")]
    pub secret_key_v2: Option<String>,

    #[serde(default, alias = "secretKeyV3", alias = "secretkeyv3")]
    pub secret_key_v3: Option<String>,

    /// Minimum v3 score in [0, 1]
    #[serde(default, alias = "scoreThreshold", alias = "scorethreshold")]
    pub score_threshold: Option<f64>,
}

impl DomainPolicy {
    /// Secret to use for the given version, if this domain supports it
    pub fn secret_for(&self, version: ChallengeVersion) -> Option<&str> {
        let secret = match version {
            ChallengeVersion::V2 => self.secret_key_v2.as_deref(),
            ChallengeVersion::V3 => self.secret_key_v3.as_deref(),
        };
        secret.filter(|s| !s.is_empty())
    }
}

// Secrets stay out of logs and panic messages.
impl std::fmt::Debug for DomainPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainPolicy")
            .field("name", &self.name)
            .field("secret_key_v2", &self.secret_key_v2.as_ref().map(|_| "<redacted>"))
            .field("secret_key_v3", &self.secret_key_v3.as_ref().map(|_| "<redacted>"))
            .field("score_threshold", &self.score_threshold)
            .finish()
    }
}

/// One incoming verification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub token: String,
    /// Value of the `Origin` header (empty when absent)
    pub origin: String,
    /// v3 action label
    pub action: Option<String>,
    /// Client address as resolved by the gateway
    pub client_address: String,
}

/// Uniform result of a validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub accepted: bool,
    pub status: u16,
    pub message: String,
}

impl VerificationOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            status: 200,
            message: String::new(),
        }
    }
}

impl From<WardenError> for VerificationOutcome {
    fn from(err: WardenError) -> Self {
        Self {
            accepted: false,
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

/// Parsed siteverify payload
///
/// Every field is optional on the wire; a missing `success` reads as false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamVerificationResult {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_ts: Option<DateTime<Utc>>,

    #[serde(default, rename = "error-codes", skip_serializing_if = "Option::is_none")]
    pub error_codes: Option<Vec<String>>,
}

/// JSON body returned by the validate endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&VerificationOutcome> for ValidateResponse {
    fn from(outcome: &VerificationOutcome) -> Self {
        Self {
            success: outcome.accepted,
            message: (!outcome.message.is_empty()).then(|| outcome.message.clone()),
        }
    }
}
