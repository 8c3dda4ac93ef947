//! Reverse proxying to the selected backend.
//!
//! # Responsibilities
//! - Ask the backend manager for a live backend
//! - Hold the connection guard while the request is in flight
//! - Rewrite the URI, strip hop-by-hop headers, append X-Forwarded-For
//! - Stream the upstream response back to the client

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, Version},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::load_balancer::Backend;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("could not build upstream URI: {0}")]
    InvalidUri(#[from] axum::http::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client),
        None => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Forwards requests over a pooled HTTP client.
#[derive(Clone)]
pub struct ReverseProxy {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl ReverseProxy {
    /// `timeout` bounds the wait for the upstream's response head.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    /// Send `request` to `backend` and return its response.
    pub async fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
        client: Option<IpAddr>,
    ) -> Result<Response<Incoming>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = backend.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(ip) = client {
            append_forwarded_for(&mut parts.headers, ip);
        }

        let pending = self.client.request(Request::from_parts(parts, body));
        let mut response = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| ProxyError::Timeout(self.timeout))??;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}

impl Default for ReverseProxy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Main proxy handler.
/// Selects a backend with the configured strategy and forwards the request.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id().to_string();
    let method = request.method().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(backend) = state.backends.get() else {
        tracing::error!(
            request_id = %request_id,
            strategy = state.backends.strategy_name(),
            "All backends are down"
        );
        metrics::record_request(&method, 503, "none", start_time);
        return ApiError::service_unavailable().into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        backend = %backend.address(),
        active_connections = backend.active_connections(),
        strategy = state.backends.strategy_name(),
        path = %request.uri().path(),
        "Proxying request"
    );

    // `backend` is a connection guard: the counter drops on every exit path.
    match state.proxy.forward(&backend, request, client).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), backend.address(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                backend = %backend.address(),
                error = %e,
                "Upstream error"
            );
            let error = match e {
                ProxyError::Timeout(_) => ApiError::gateway_timeout(),
                _ => ApiError::bad_gateway(),
            };
            metrics::record_request(&method, error.code, backend.address(), start_time);
            error.into_response()
        }
    }
}
