//! Configuration management for Warden.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use warden_common::DomainPolicy;
use warden_common::constants::{
    DEFAULT_LISTEN_ADDR, DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SITEVERIFY_URL, DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

use crate::network::{AllowList, NetworkPolicy};
use crate::rate_limit::RateLimiter;
use crate::registry::DomainRegistry;

/// Environment variable prefix (`WARDEN__LISTEN_ADDR`, ...)
const ENV_PREFIX: &str = "WARDEN";

/// Application configuration
///
/// camelCase aliases keep configuration files from the older JSON layout
/// loadable unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Legacy port-only setting; replaces the port of `listen_addr`
    #[serde(default)]
    pub port: Option<u16>,

    /// Upstream siteverify endpoint
    #[serde(
        default = "default_recaptcha_endpoint",
        alias = "recaptchaEndpoint",
        alias = "recaptchaendpoint"
    )]
    pub recaptcha_endpoint: String,

    /// Skip verification for loopback/private client addresses
    #[serde(default, alias = "autoValidateLocalIp", alias = "autovalidatelocalip")]
    pub auto_validate_local_ip: bool,

    /// Client addresses that always skip verification
    #[serde(default, alias = "allowedIPs", alias = "allowedips")]
    pub allowed_ips: Vec<String>,

    /// Registered consumer domains, in match precedence order
    #[serde(default)]
    pub domains: Vec<DomainPolicy>,

    /// Upstream call timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Per-client request limiting
    #[serde(default, alias = "rateLimit", alias = "ratelimit")]
    pub rate_limit: RateLimitConfig,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Limiting only runs when this is set
    #[serde(default)]
    pub active: bool,

    /// Window length in milliseconds
    #[serde(default = "default_rate_window", alias = "windowMs", alias = "windowms")]
    pub window_ms: u64,

    /// Requests allowed per client per window
    #[serde(default = "default_rate_max")]
    pub max: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// The limiter to install, if limiting is active
    pub fn limiter(&self) -> Option<RateLimiter> {
        self.active.then(|| RateLimiter::new(self.window(), self.max))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            active: false,
            window_ms: default_rate_window(),
            max: default_rate_max(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_recaptcha_endpoint() -> String { DEFAULT_SITEVERIFY_URL.to_string() }
fn default_upstream_timeout() -> u64 { DEFAULT_UPSTREAM_TIMEOUT_SECS }
fn default_request_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_rate_window() -> u64 { DEFAULT_RATE_LIMIT_WINDOW_MS }
fn default_rate_max() -> u32 { DEFAULT_RATE_LIMIT_MAX }

impl AppConfig {
    /// Load configuration from file, then environment, then CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();

        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_ips"),
            )
            .build()
            .context("Failed to load configuration")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        if let Some(port) = config.port {
            config.listen_addr = with_port(&config.listen_addr, port);
        }

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(port) = args.port {
            config.listen_addr = with_port(&config.listen_addr, port);
        }
        if let Some(ref endpoint) = args.recaptcha_endpoint {
            config.recaptcha_endpoint = endpoint.clone();
        }

        config.normalize();
        Ok(config)
    }

    /// Empty or zero settings fall back to their defaults
    fn normalize(&mut self) {
        if self.recaptcha_endpoint.trim().is_empty() {
            self.recaptcha_endpoint = default_recaptcha_endpoint();
        }
        if self.rate_limit.window_ms == 0 {
            self.rate_limit.window_ms = default_rate_window();
        }
        if self.rate_limit.max == 0 {
            self.rate_limit.max = default_rate_max();
        }
    }

    /// Build the immutable domain registry, failing on invalid entries
    pub fn registry(&self) -> Result<DomainRegistry> {
        DomainRegistry::new(self.domains.clone()).context("Invalid domain configuration")
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        NetworkPolicy::new(
            AllowList::new(self.allowed_ips.iter().cloned()),
            self.auto_validate_local_ip,
        )
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Keep the host of `addr`, swap in `port`
fn with_port(addr: &str, port: u16) -> String {
    let host = addr
        .rsplit_once(':')
        .map(|(host, _)| host)
        .filter(|host| !host.is_empty())
        .unwrap_or("0.0.0.0");
    format!("{host}:{port}")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: None,
            recaptcha_endpoint: default_recaptcha_endpoint(),
            auto_validate_local_ip: false,
            allowed_ips: Vec::new(),
            domains: Vec::new(),
            upstream_timeout_secs: default_upstream_timeout(),
            request_timeout_secs: default_request_timeout(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
