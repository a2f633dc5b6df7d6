//! Validation orchestrator shared by the v2 and v3 endpoints.
//!
//! ```text
//! Start → TokenCheck → OriginCheck → DomainLookup ─┬─→ BypassAccept ─→ Outcome
//!                                                  └─→ UpstreamCall ─→ Outcome
//! ```
//!
//! Each step returns `Result<_, WardenError>`; the error is turned into a
//! [`VerificationOutcome`] once, at the end. No step retries.

use std::sync::Arc;

use warden_common::{
    ChallengeVersion, DomainPolicy, UpstreamVerificationResult, ValidationRequest,
    VerificationOutcome, WardenError,
    constants::{DEFAULT_V3_ACTION, messages},
};

use crate::fingerprint::token_fingerprint;
use crate::network::NetworkPolicy;
use crate::registry::DomainRegistry;
use crate::upstream::SiteVerifier;

/// What the domain lookup resolved for this request
struct Resolved<'a> {
    secret: &'a str,
    /// Only set for v3
    threshold: Option<f64>,
}

/// Validates challenge tokens against registered domain policies
pub struct Validator {
    registry: Arc<DomainRegistry>,
    network: NetworkPolicy,
    verifier: Arc<dyn SiteVerifier>,
}

impl Validator {
    pub fn new(
        registry: Arc<DomainRegistry>,
        network: NetworkPolicy,
        verifier: Arc<dyn SiteVerifier>,
    ) -> Self {
        Self {
            registry,
            network,
            verifier,
        }
    }

    /// Run the full decision for one request
    pub async fn validate(
        &self,
        version: ChallengeVersion,
        request: &ValidationRequest,
    ) -> VerificationOutcome {
        match self.run(version, request).await {
            Ok(()) => VerificationOutcome::accepted(),
            Err(err) => {
                if err.is_upstream() {
                    tracing::error!(
                        version = %version,
                        origin = %request.origin,
                        error = %err,
                        "Validation error"
                    );
                }
                err.into()
            }
        }
    }

    async fn run(
        &self,
        version: ChallengeVersion,
        request: &ValidationRequest,
    ) -> Result<(), WardenError> {
        if request.token.is_empty() {
            return Err(WardenError::InvalidInput(messages::TOKEN_REQUIRED.to_string()));
        }
        if request.origin.is_empty() {
            return Err(WardenError::InvalidInput(messages::ORIGIN_REQUIRED.to_string()));
        }

        let resolved = self.resolve(version, &request.origin)?;

        if self.network.bypasses(&request.client_address) {
            tracing::info!(
                version = %version,
                client = %request.client_address,
                "Request from allowed IP"
            );
            return Ok(());
        }

        match version {
            ChallengeVersion::V2 => {
                let result = self
                    .verifier
                    .verify(resolved.secret, &request.token, None)
                    .await?;
                self.judge_v2(request, &result)
            }
            ChallengeVersion::V3 => {
                let sent_action = request.action.as_deref().unwrap_or(DEFAULT_V3_ACTION);
                let result = self
                    .verifier
                    .verify(resolved.secret, &request.token, Some(sent_action))
                    .await?;
                // resolve() guarantees a threshold for v3
                let threshold = resolved.threshold.unwrap_or(f64::INFINITY);
                self.judge_v3(request, threshold, &result)
            }
        }
    }

    /// DomainLookup: the policy must exist and support this version
    fn resolve(&self, version: ChallengeVersion, origin: &str) -> Result<Resolved<'_>, WardenError> {
        let policy: &DomainPolicy = self.registry.find_policy(origin).ok_or_else(|| {
            tracing::debug!(origin = %origin, "No registered domain for origin");
            WardenError::Configuration
        })?;

        let secret = policy.secret_for(version).ok_or_else(|| {
            tracing::debug!(domain = %policy.name, version = %version, "Domain has no secret for version");
            WardenError::Configuration
        })?;

        let threshold = match version {
            ChallengeVersion::V2 => None,
            ChallengeVersion::V3 => Some(policy.score_threshold.ok_or_else(|| {
                tracing::debug!(domain = %policy.name, "Domain has no v3 score threshold");
                WardenError::Configuration
            })?),
        };

        Ok(Resolved { secret, threshold })
    }

    fn judge_v2(
        &self,
        request: &ValidationRequest,
        result: &UpstreamVerificationResult,
    ) -> Result<(), WardenError> {
        if result.success {
            return Ok(());
        }

        tracing::info!(
            token = %token_fingerprint(&request.token),
            origin = %request.origin,
            error_codes = ?result.error_codes,
            "reCAPTCHA v2 rejected"
        );
        Err(WardenError::PolicyRejection)
    }

    fn judge_v3(
        &self,
        request: &ValidationRequest,
        threshold: f64,
        result: &UpstreamVerificationResult,
    ) -> Result<(), WardenError> {
        // Binds to what the client asked for, not to the upstream fallback
        let action_matches = result.action.as_deref() == request.action.as_deref();
        let score_passes = result.score.is_some_and(|score| score >= threshold);

        if result.success && action_matches && score_passes {
            return Ok(());
        }

        tracing::info!(
            token = %token_fingerprint(&request.token),
            origin = %request.origin,
            success = result.success,
            expected_action = ?request.action,
            action = ?result.action,
            score = ?result.score,
            threshold,
            hostname = ?result.hostname,
            error_codes = ?result.error_codes,
            "reCAPTCHA v3 rejected"
        );
        Err(WardenError::PolicyRejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AllowList;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed result and records the calls it receives.
    struct MockVerifier {
        reply: Result<UpstreamVerificationResult, WardenError>,
        calls: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl MockVerifier {
        fn replying(reply: Result<UpstreamVerificationResult, WardenError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SiteVerifier for MockVerifier {
        async fn verify(
            &self,
            secret: &str,
            token: &str,
            action: Option<&str>,
        ) -> Result<UpstreamVerificationResult, WardenError> {
            self.calls.lock().unwrap().push((
                secret.to_string(),
                token.to_string(),
                action.map(str::to_string),
            ));
            self.reply.clone()
        }
    }

    /// Fails the test if the upstream is ever contacted.
    struct UnreachableVerifier {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl SiteVerifier for UnreachableVerifier {
        async fn verify(
            &self,
            _secret: &str,
            _token: &str,
            _action: Option<&str>,
        ) -> Result<UpstreamVerificationResult, WardenError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            panic!("upstream must not be called for bypassed clients");
        }
    }

    fn registry() -> Arc<DomainRegistry> {
        Arc::new(
            DomainRegistry::new(vec![
                DomainPolicy {
                    name: "example.com".into(),
                    secret_key_v2: Some("v2-secret".into()),
                    secret_key_v3: Some("v3-secret".into()),
                    score_threshold: Some(0.5),
                },
                DomainPolicy {
                    name: "v2only.org".into(),
                    secret_key_v2: Some("v2only-secret".into()),
                    secret_key_v3: None,
                    score_threshold: None,
                },
                DomainPolicy {
                    name: "nothreshold.net".into(),
                    secret_key_v2: None,
                    secret_key_v3: Some("v3-secret".into()),
                    score_threshold: None,
                },
            ])
            .unwrap(),
        )
    }

    fn validator(verifier: Arc<dyn SiteVerifier>, network: NetworkPolicy) -> Validator {
        Validator::new(registry(), network, verifier)
    }

    fn request(token: &str, origin: &str, action: Option<&str>) -> ValidationRequest {
        ValidationRequest {
            token: token.into(),
            origin: origin.into(),
            action: action.map(Into::into),
            client_address: "203.0.113.50".into(),
        }
    }

    fn v3_reply(success: bool, action: &str, score: Option<f64>) -> UpstreamVerificationResult {
        UpstreamVerificationResult {
            success,
            action: Some(action.into()),
            score,
            ..Default::default()
        }
    }

    fn rejected(status: u16, message: &str) -> VerificationOutcome {
        VerificationOutcome {
            accepted: false,
            status,
            message: message.into(),
        }
    }

    #[tokio::test]
    async fn test_v2_input_errors() {
        let mock = MockVerifier::replying(Ok(UpstreamVerificationResult::default()));
        let v = validator(mock.clone(), NetworkPolicy::default());

        let outcome = v
            .validate(ChallengeVersion::V2, &request("", "https://example.com", None))
            .await;
        assert_eq!(outcome, rejected(400, "Token is required."));

        let outcome = v.validate(ChallengeVersion::V2, &request("tok", "", None)).await;
        assert_eq!(outcome, rejected(400, "Origin is required."));

        let outcome = v
            .validate(ChallengeVersion::V2, &request("tok", "https://unknown.io", None))
            .await;
        assert_eq!(outcome, rejected(400, "Invalid domain configuration."));

        let outcome = v
            .validate(ChallengeVersion::V2, &request("tok", "https://nothreshold.net", None))
            .await;
        assert_eq!(outcome, rejected(400, "Invalid domain configuration."));

        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_token_checked_before_origin() {
        let mock = MockVerifier::replying(Ok(UpstreamVerificationResult::default()));
        let v = validator(mock, NetworkPolicy::default());

        let outcome = v.validate(ChallengeVersion::V3, &request("", "", None)).await;
        assert_eq!(outcome.message, "Token is required.");
    }

    #[tokio::test]
    async fn test_allow_listed_client_skips_upstream() {
        let verifier = Arc::new(UnreachableVerifier {
            hits: AtomicUsize::new(0),
        });
        let network = NetworkPolicy::new(AllowList::new(["203.0.113.50"]), false);
        let v = validator(verifier.clone(), network);

        for version in [ChallengeVersion::V2, ChallengeVersion::V3] {
            let outcome = v
                .validate(version, &request("tok", "https://example.com", Some("login")))
                .await;
            assert_eq!(outcome, VerificationOutcome::accepted());
        }
        assert_eq!(verifier.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_local_client_bypass_requires_flag() {
        let mut req = request("tok", "https://example.com", None);
        req.client_address = "192.168.1.20".into();

        let verifier = Arc::new(UnreachableVerifier {
            hits: AtomicUsize::new(0),
        });
        let v = validator(verifier, NetworkPolicy::new(AllowList::default(), true));
        assert!(v.validate(ChallengeVersion::V2, &req).await.accepted);

        let mock = MockVerifier::replying(Ok(UpstreamVerificationResult::default()));
        let v = validator(mock.clone(), NetworkPolicy::new(AllowList::default(), false));
        let outcome = v.validate(ChallengeVersion::V2, &req).await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bypass_does_not_skip_domain_check() {
        let network = NetworkPolicy::new(AllowList::new(["203.0.113.50"]), true);
        let mock = MockVerifier::replying(Ok(UpstreamVerificationResult::default()));
        let v = validator(mock, network);

        let outcome = v
            .validate(ChallengeVersion::V2, &request("tok", "https://unknown.io", None))
            .await;
        assert_eq!(outcome, rejected(400, "Invalid domain configuration."));
    }

    #[tokio::test]
    async fn test_v2_upstream_verdicts() {
        let pass = MockVerifier::replying(Ok(UpstreamVerificationResult {
            success: true,
            ..Default::default()
        }));
        let v = validator(pass.clone(), NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V2, &request("tok", "https://www.example.com", Some("x")))
            .await;
        assert_eq!(outcome, VerificationOutcome::accepted());
        assert_eq!(
            pass.calls.lock().unwrap()[0],
            ("v2-secret".to_string(), "tok".to_string(), None)
        );

        let fail = MockVerifier::replying(Ok(UpstreamVerificationResult {
            success: false,
            error_codes: Some(vec!["invalid-input-response".into()]),
            ..Default::default()
        }));
        let v = validator(fail, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V2, &request("tok", "https://example.com", None))
            .await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));
    }

    #[tokio::test]
    async fn test_v3_score_and_action() {
        let origin = "https://example.com";

        let mock = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.9))));
        let v = validator(mock.clone(), NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", origin, Some("login")))
            .await;
        assert_eq!(outcome, VerificationOutcome::accepted());
        assert_eq!(
            mock.calls.lock().unwrap()[0],
            (
                "v3-secret".to_string(),
                "tok".to_string(),
                Some("login".to_string())
            )
        );

        let low = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.3))));
        let v = validator(low, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", origin, Some("login")))
            .await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));

        let mismatch = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.9))));
        let v = validator(mismatch, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", origin, Some("signup")))
            .await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));

        let unsuccessful = MockVerifier::replying(Ok(v3_reply(false, "login", Some(0.9))));
        let v = validator(unsuccessful, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", origin, Some("login")))
            .await;
        assert!(!outcome.accepted);
    }

    #[tokio::test]
    async fn test_v3_threshold_is_inclusive() {
        let mock = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.5))));
        let v = validator(mock, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", "https://example.com", Some("login")))
            .await;
        assert!(outcome.accepted);
    }

    #[tokio::test]
    async fn test_v3_missing_score_rejects() {
        let mock = MockVerifier::replying(Ok(v3_reply(true, "login", None)));
        let v = validator(mock, NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", "https://example.com", Some("login")))
            .await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));
    }

    #[tokio::test]
    async fn test_v3_default_action() {
        let mock = MockVerifier::replying(Ok(v3_reply(true, "default", Some(0.8))));
        let v = validator(mock.clone(), NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", "https://example.com", None))
            .await;
        assert_eq!(outcome, rejected(400, "reCAPTCHA validation failed."));
        assert_eq!(mock.calls.lock().unwrap()[0].2.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_v3_missing_action_on_both_sides_matches() {
        let mock = MockVerifier::replying(Ok(UpstreamVerificationResult {
            success: true,
            score: Some(0.8),
            ..Default::default()
        }));
        let v = validator(mock.clone(), NetworkPolicy::default());
        let outcome = v
            .validate(ChallengeVersion::V3, &request("tok", "https://example.com", None))
            .await;
        assert!(outcome.accepted);
        assert_eq!(mock.calls.lock().unwrap()[0].2.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_v3_requires_secret_and_threshold() {
        let mock = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.9))));
        let v = validator(mock.clone(), NetworkPolicy::default());

        for origin in ["https://v2only.org", "https://nothreshold.net"] {
            let outcome = v
                .validate(ChallengeVersion::V3, &request("tok", origin, Some("login")))
                .await;
            assert_eq!(outcome, rejected(400, "Invalid domain configuration."));
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500() {
        let mock = MockVerifier::replying(Err(WardenError::UpstreamUnreachable(
            "reCAPTCHA verifier unreachable: connection refused".into(),
        )));
        let v = validator(mock, NetworkPolicy::default());

        for version in [ChallengeVersion::V2, ChallengeVersion::V3] {
            let outcome = v
                .validate(version, &request("tok", "https://example.com", Some("login")))
                .await;
            assert!(!outcome.accepted);
            assert_eq!(outcome.status, 500);
            assert!(!outcome.message.is_empty());
        }
    }

    #[tokio::test]
    async fn test_idempotent() {
        let mock = MockVerifier::replying(Ok(v3_reply(true, "login", Some(0.7))));
        let v = validator(mock.clone(), NetworkPolicy::default());
        let req = request("tok", "https://example.com", Some("login"));

        let first = v.validate(ChallengeVersion::V3, &req).await;
        let second = v.validate(ChallengeVersion::V3, &req).await;
        assert_eq!(first, second);
        assert_eq!(mock.call_count(), 2);
    }
}
