//! Admission middleware for proxied traffic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::rate_limit::RateLimiter;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate limit key for a request: the first `X-Forwarded-For` hop if present,
/// otherwise the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Reject the request with 429 when the client's bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);

    if limiter.allow(&key).await {
        next.run(request).await
    } else {
        tracing::warn!(ip = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::too_many_requests().into_response()
    }
}
