//! Origin-based access control.
//!
//! An origin is allowed when it ends with a registered domain name, the same
//! rule the registry uses. Requests without an `Origin` header get no CORS
//! headers at all.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header, request::Parts};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::registry::DomainRegistry;

/// Access decision for a request's `Origin` header
pub fn origin_allowed(registry: &DomainRegistry, origin: Option<&str>) -> bool {
    let Some(origin) = origin.filter(|o| !o.is_empty()) else {
        tracing::warn!("Origin header is missing or undefined");
        return false;
    };

    let allowed = registry.names().any(|name| origin.ends_with(name));
    if !allowed {
        tracing::warn!(origin = %origin, "CORS policy violation");
    }
    allowed
}

/// CORS layer restricted to registered domains
pub fn cors_layer(registry: Arc<DomainRegistry>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin_allowed(&registry, origin.to_str().ok())
            },
        ))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
