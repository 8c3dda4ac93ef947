//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy, admin and healthcheck handlers
//! - Wire up middleware (request ID, tracing, panic recovery, rate limit)
//! - Start the health monitor and rate limiter refill loop
//! - Serve until shutdown, then drain in-flight requests for a bounded grace period

use std::any::Any;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::admin;
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::proxy::{proxy_handler, ReverseProxy};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::ApiError;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendManager, BackendPool};
use crate::rate_limit::{
    rate_limit_middleware, InMemorySettingsRepository, RateLimiter, SettingsRepository,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid backend url `{url}`: {source}")]
    InvalidBackend {
        url: String,
        source: url::ParseError,
    },
    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub backends: Arc<BackendManager>,
    pub proxy: ReverseProxy,
    pub limiter: Arc<RateLimiter>,
    pub settings: Arc<dyn SettingsRepository>,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server that keeps rate limit overrides in memory.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        Self::with_settings(config, Arc::new(InMemorySettingsRepository::new()))
    }

    /// Create a server backed by the given settings repository.
    pub fn with_settings(
        config: ProxyConfig,
        settings: Arc<dyn SettingsRepository>,
    ) -> Result<Self, ServerError> {
        let pool = BackendPool::from_urls(&config.pool.backends)
            .map_err(|(url, source)| ServerError::InvalidBackend { url, source })?;
        let backends = Arc::new(BackendManager::new(Arc::new(pool), config.pool.method));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), settings.clone()));

        let state = AppState {
            backends,
            proxy: ReverseProxy::new(Duration::from_secs(config.timeouts.request_secs)),
            limiter,
            settings,
        };

        let router = Self::build_router(state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let proxied = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                rate_limit_middleware,
            ));

        Router::new()
            .route("/healthcheck", get(healthcheck))
            .merge(admin::routes())
            .merge(proxied)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// All shutdown receivers are taken before this returns, so a trigger
    /// sent between this call and the first poll still stops the server.
    pub fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> impl Future<Output = Result<(), ServerError>> + Send {
        let health_stop = shutdown.subscribe();
        let refill_stop = shutdown.subscribe();
        let mut stop_accepting = shutdown.subscribe();
        let mut stopping = shutdown.subscribe();

        async move {
            // Keep the sender alive so receivers do not see a closed channel.
            let _shutdown = shutdown;

            let addr = listener.local_addr()?;
            tracing::info!(
                address = %addr,
                strategy = self.state.backends.strategy_name(),
                backends = self.state.backends.pool().len(),
                "HTTP server starting"
            );

            if self.config.health_check.enabled {
                let monitor = HealthMonitor::new(
                    self.state.backends.pool().clone(),
                    self.config.health_check.clone(),
                );
                tokio::spawn(monitor.run(health_stop));
            } else {
                tracing::info!("Active health checks disabled");
            }
            tokio::spawn(self.state.limiter.clone().run(refill_stop));

            let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_accepting.recv().await;
                })
                .into_future();
            let mut server = tokio::spawn(serve);

            tokio::select! {
                result = &mut server => result??,
                _ = stopping.recv() => {
                    let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
                    tracing::info!(grace = ?grace, "Draining in-flight requests");
                    match tokio::time::timeout(grace, &mut server).await {
                        Ok(result) => result??,
                        Err(_) => {
                            tracing::warn!("Grace period elapsed, closing remaining connections");
                            server.abort();
                        }
                    }
                }
            }

            tracing::info!("HTTP server stopped");
            Ok(())
        }
    }

    /// A clone of the router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn healthcheck() -> &'static str {
    "OK"
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    ApiError::internal("Internal server error").into_response()
}
