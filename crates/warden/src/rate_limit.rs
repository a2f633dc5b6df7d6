//! Per-client fixed-window rate limiting.
//!
//! Each client address gets a counter that resets once its window has
//! elapsed. Counters live in process memory only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use warden_common::constants::messages;

use crate::client_ip::client_ip_from;

/// Expired windows are swept once the table grows past this many clients
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `client` and decide whether it may proceed
    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Decision {
        // A panic while holding the lock leaves only counters behind
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let entry = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count <= self.max {
            Decision::Allowed
        } else {
            Decision::Limited {
                retry_after: self.window.saturating_sub(now.duration_since(entry.started)),
            }
        }
    }
}

/// Middleware: 429 with `Retry-After` once a client exhausts its window
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip_from(req.headers(), req.uri(), req.extensions());

    match limiter.check(&client) {
        Decision::Allowed => next.run(req).await,
        Decision::Limited { retry_after } => {
            tracing::warn!(
                client = %client,
                path = %req.uri().path(),
                "Rate limit exceeded"
            );
            let retry_secs = retry_after.as_secs().max(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                messages::RATE_LIMITED,
            )
                .into_response()
        }
    }
}
