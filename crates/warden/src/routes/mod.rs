//! HTTP route handlers for Warden.

use std::panic::AssertUnwindSafe;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::FutureExt;
use tower_http::{
    set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use warden_common::constants::messages;

use crate::client_ip::client_ip_from;
use crate::cors::cors_layer;
use crate::rate_limit;
use crate::state::AppState;

mod health;
mod validate;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.registry.clone());
    let request_timeout = state.config.request_timeout();
    let rate_limiter = state.rate_limiter.clone();

    let router = Router::new()
        // Health & Status
        .route("/health", get(health::health_check))

        // Token validation
        .route("/v2/validate", post(validate::validate_v2))
        .route("/v3/validate", post(validate::validate_v3))

        // Add shared state
        .with_state(state)

        .layer(middleware::from_fn(catch_panics));

    let router = match rate_limiter {
        Some(limiter) => router.layer(middleware::from_fn_with_state(limiter, rate_limit::enforce)),
        None => router,
    };

    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Last line of defense: a panicking handler becomes a bare 500
///
/// Details stay in the server log; the client only sees a generic body.
async fn catch_panics(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = client_ip_from(req.headers(), req.uri(), req.extensions());

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            tracing::error!(
                status = 500,
                panic = %message,
                path = %path,
                method = %method,
                client = %client,
                "Unhandled error"
            );

            (StatusCode::INTERNAL_SERVER_ERROR, messages::INTERNAL_FAILURE).into_response()
        }
    }
}
