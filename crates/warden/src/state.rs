//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::network::NetworkPolicy;
use crate::rate_limit::RateLimiter;
use crate::registry::DomainRegistry;
use crate::upstream::{HttpSiteVerifier, SiteVerifier};
use crate::validator::Validator;

/// Shared application state
///
/// Everything in here except the rate limiter's counters is immutable
/// after startup, so handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Registered domains (also drives the CORS decision)
    pub registry: Arc<DomainRegistry>,

    /// v2/v3 validation orchestrator
    pub validator: Arc<Validator>,

    /// Per-client limiter, present when rate limiting is active
    pub rate_limiter: Option<Arc<RateLimiter>>,

    /// Process start time, reported by the health endpoint
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create application state backed by the HTTP siteverify client
    pub fn new(config: AppConfig) -> Result<Self> {
        let verifier = HttpSiteVerifier::new(&config.recaptcha_endpoint, config.upstream_timeout())
            .context("Failed to create HTTP client")?;
        let registry = config.registry()?;
        let network = config.network_policy();

        if registry.is_empty() {
            tracing::warn!("No domains configured; every validation will be rejected");
        }
        tracing::debug!(endpoint = %verifier.endpoint(), "Siteverify client ready");

        Ok(Self::with_verifier(config, registry, network, Arc::new(verifier)))
    }

    /// Assemble state around any verifier implementation
    pub fn with_verifier(
        config: AppConfig,
        registry: DomainRegistry,
        network: NetworkPolicy,
        verifier: Arc<dyn SiteVerifier>,
    ) -> Self {
        let registry = Arc::new(registry);
        let validator = Arc::new(Validator::new(registry.clone(), network, verifier));
        let rate_limiter = config.rate_limit.limiter().map(Arc::new);

        Self {
            config: Arc::new(config),
            registry,
            validator,
            rate_limiter,
            started_at: Utc::now(),
        }
    }

    /// Seconds since startup
    pub fn uptime_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
