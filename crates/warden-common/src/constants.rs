//! Shared constants for Warden components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Public siteverify endpoint used when none is configured
pub const DEFAULT_SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Action sent upstream when a v3 request names none
pub const DEFAULT_V3_ACTION: &str = "default";

/// Upstream siteverify call timeout (seconds)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Upstream connect timeout (seconds)
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Whole-request timeout at the gateway boundary (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Rate limit window when none is configured (15 minutes)
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 15 * 60 * 1000;

/// Requests allowed per client per window when none is configured
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;

/// Addresses that are always treated as local
pub const LOOPBACK_ADDRESSES: [&str; 4] = ["127.0.0.1", "0.0.0.0", "::1", "::ffff:127.0.0.1"];

/// Response messages returned to callers
pub mod messages {
    pub const TOKEN_REQUIRED: &str = "Token is required.";
    pub const ORIGIN_REQUIRED: &str = "Origin is required.";
    pub const INVALID_DOMAIN: &str = "Invalid domain configuration.";
    pub const VALIDATION_FAILED: &str = "reCAPTCHA validation failed.";
    pub const UPSTREAM_STATUS: &str = "Failed to validate reCAPTCHA.";
    pub const INTERNAL_FAILURE: &str = "Something failed!";
    pub const RATE_LIMITED: &str = "Too many requests, please try again later.";
}

/// HTTP header names
pub mod headers {
    /// Comma-separated proxy chain
    pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

    /// Single client address set by nginx-style proxies
    pub const X_REAL_IP: &str = "x-real-ip";
}
