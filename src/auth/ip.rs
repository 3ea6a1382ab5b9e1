//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, extract::Request};

/// Extract the client IP for a request.
///
/// With `trust_forwarded` set (running behind a reverse proxy), the first
/// `X-Forwarded-For` entry wins. Otherwise the socket address from
/// `ConnectInfo` is used. Returns `None` when neither is available, which
/// happens for in-process requests that bypass the TCP listener.
pub fn extract_client_ip<B>(request: &Request<B>, trust_forwarded: bool) -> Option<String> {
    if trust_forwarded {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}
