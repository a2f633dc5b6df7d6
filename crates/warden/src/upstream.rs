//! Siteverify protocol client.
//!
//! Wire contract: `POST <endpoint>` with a form body of `secret`, `response`
//! and, for v3, `action`. The verifier answers with JSON
//! `{success, score?, action?, hostname?, challenge_ts?, "error-codes"?}`.

use std::time::Duration;

use async_trait::async_trait;
use warden_common::{
    UpstreamVerificationResult, WardenError,
    constants::{UPSTREAM_CONNECT_TIMEOUT_SECS, messages},
};

/// Anything able to check a token against the upstream verifier
#[async_trait]
pub trait SiteVerifier: Send + Sync {
    /// Verify `token` with the domain's `secret`; `action` is sent for v3 only
    async fn verify(
        &self,
        secret: &str,
        token: &str,
        action: Option<&str>,
    ) -> Result<UpstreamVerificationResult, WardenError>;
}

/// reqwest-backed verifier
pub struct HttpSiteVerifier {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSiteVerifier {
    /// Create a verifier whose every call is bounded by `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS).min(timeout))
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SiteVerifier for HttpSiteVerifier {
    async fn verify(
        &self,
        secret: &str,
        token: &str,
        action: Option<&str>,
    ) -> Result<UpstreamVerificationResult, WardenError> {
        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(action) = action {
            form.push(("action", action));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Verifier returned non-success status"
            );
            return Err(WardenError::UpstreamProtocol(
                messages::UPSTREAM_STATUS.to_string(),
            ));
        }

        response
            .json::<UpstreamVerificationResult>()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    WardenError::UpstreamProtocol(format!("Malformed verifier response: {e}"))
                } else {
                    transport_error(e)
                }
            })
    }
}

fn transport_error(err: reqwest::Error) -> WardenError {
    if err.is_timeout() {
        WardenError::UpstreamUnreachable("reCAPTCHA verifier timed out.".to_string())
    } else {
        WardenError::UpstreamUnreachable(format!("reCAPTCHA verifier unreachable: {err}"))
    }
}
