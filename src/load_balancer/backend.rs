//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track active connections (for Least Connections LB)
//! - Track liveness as reported by the health monitor
//! - Build upstream URIs for forwarded requests

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::Uri;
use url::{Position, Url};

/// A single backend server.
///
/// Liveness and the connection counter are synchronized independently;
/// no operation needs both at once.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    alive: AtomicBool,
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a new backend. Backends start alive until a probe says otherwise.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Parse `raw` and create a backend for it.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Url::parse(raw).map(Self::new)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base address without the trailing slash `Url` adds to bare hosts.
    pub fn address(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Set liveness, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Count a dispatched request. The returned guard releases it on drop.
    pub fn acquire(self: &Arc<Self>) -> BackendConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
        BackendConnectionGuard {
            backend: self.clone(),
        }
    }

    fn release(&self) {
        // Saturating: the counter never goes below zero.
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// URL probed by the health monitor.
    pub fn probe_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.address(), endpoint)
    }

    /// Rewrite an incoming request URI so it targets this backend.
    ///
    /// The backend's base path is joined with the request path by exactly one
    /// slash, and query strings are concatenated with `&`.
    pub fn upstream_uri(&self, incoming: &Uri) -> Result<Uri, axum::http::Error> {
        let base = self.url.path().trim_end_matches('/');
        let path = format!("{}/{}", base, incoming.path().trim_start_matches('/'));

        let query = [self.url.query(), incoming.query()]
            .into_iter()
            .flatten()
            .filter(|q| !q.is_empty())
            .collect::<Vec<_>>()
            .join("&");

        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query)
        };

        Uri::builder()
            .scheme(self.url.scheme())
            .authority(&self.url[Position::BeforeHost..Position::AfterPort])
            .path_and_query(path_and_query)
            .build()
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
}

impl BackendConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.release();
    }
}
