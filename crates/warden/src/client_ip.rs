//! Client address resolution behind proxies.
//!
//! Order of precedence:
//! 1. `X-Forwarded-For`: leftmost entry, or rightmost with `?reverseProxy=true`
//! 2. `X-Real-Ip`
//! 3. The socket peer address

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Query},
    http::{Extensions, HeaderMap, Uri, request::Parts},
};
use serde::Deserialize;

use warden_common::constants::headers;

#[derive(Deserialize)]
struct ProxyQuery {
    #[serde(rename = "reverseProxy")]
    reverse_proxy: Option<String>,
}

/// Resolved client address (empty when nothing identifies the client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip_from(&parts.headers, &parts.uri, &parts.extensions)))
    }
}

/// Resolve from raw request pieces (used where no extractor runs)
pub fn client_ip_from(headers: &HeaderMap, uri: &Uri, extensions: &Extensions) -> String {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    resolve_client_ip(headers, reverse_proxy_flag(uri), peer)
}

fn reverse_proxy_flag(uri: &Uri) -> bool {
    Query::<ProxyQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.reverse_proxy)
        .is_some_and(|v| v == "true")
}

pub fn resolve_client_ip(
    headers: &HeaderMap,
    reverse_proxy: bool,
    peer: Option<SocketAddr>,
) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header(headers::X_FORWARDED_FOR) {
        let mut hops = forwarded.split(',').map(str::trim);
        let hop = if reverse_proxy { hops.next_back() } else { hops.next() };
        if let Some(hop) = hop.filter(|h| !h.is_empty()) {
            return hop.to_string();
        }
    }

    if let Some(real_ip) = header(headers::X_REAL_IP) {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}
