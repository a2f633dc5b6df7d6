//! Error taxonomy for token validation.

use thiserror::Error;

use crate::constants::messages;

/// Every way a validation can end without acceptance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WardenError {
    /// Missing token or origin
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown domain, or a domain lacking the secret for this version
    #[error("{}", messages::INVALID_DOMAIN)]
    Configuration,

    /// Upstream rejected the token, or the v3 action/score did not match
    #[error("{}", messages::VALIDATION_FAILED)]
    PolicyRejection,

    /// Transport failure or timeout reaching the verifier
    #[error("{0}")]
    UpstreamUnreachable(String),

    /// Verifier answered with a non-success status or an unreadable body
    #[error("{0}")]
    UpstreamProtocol(String),
}

impl WardenError {
    /// Returns the HTTP status code for this error
    ///
    /// Configuration errors share the input-error status so callers cannot
    /// probe which domains are registered.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Configuration => 400,
            Self::PolicyRejection => 400,
            Self::UpstreamUnreachable(_) => 500,
            Self::UpstreamProtocol(_) => 500,
        }
    }

    /// Returns true if the failure came from the upstream verifier
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamUnreachable(_) | Self::UpstreamProtocol(_))
    }
}
