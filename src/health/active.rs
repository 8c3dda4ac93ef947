//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend liveness based on results

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            pool,
            config,
            client,
        }
    }

    /// Probe on every tick until shutdown. The first round runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = ?self.config.interval(),
            endpoint = %self.config.endpoint,
            backends = self.pool.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_all().await;
                }
            }
        }
    }

    /// Probe every backend concurrently and update liveness.
    pub async fn check_all(&self) {
        join_all(self.pool.backends().iter().map(|backend| async move {
            let healthy = self.probe(backend).await;
            let was_alive = backend.set_alive(healthy);
            if was_alive != healthy {
                if healthy {
                    tracing::info!(backend = %backend.address(), "Backend is back up");
                } else {
                    tracing::warn!(backend = %backend.address(), "Backend marked down");
                }
            }
            metrics::record_backend_health(backend.address(), healthy);
        }))
        .await;
    }

    /// One GET against the backend's health endpoint. Only 200 counts as alive.
    pub async fn probe(&self, backend: &Backend) -> bool {
        let uri = backend.probe_url(&self.config.endpoint);
        let request = match Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "lbproxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(uri = %uri, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(self.config.timeout(), self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => true,
            Ok(Ok(response)) => {
                tracing::warn!(backend = %backend.address(), status = %response.status(), "Health check failed: unexpected status");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %backend.address(), error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(backend = %backend.address(), "Health check failed: timeout");
                false
            }
        }
    }
}
