//! HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ request id ──▶ rate limiter ──▶ strategy ──▶ backend pool ──▶ Backend
//!                                   │                             ▲
//!                                   ▼                             │
//!                           settings repository            health monitor
//!
//!     Operator ──▶ /api/ratelimit/config, /api/backends
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use lbproxy::config::{self, BalancingMethod, ProxyConfig};
use lbproxy::lifecycle::{wait_for_signal, Shutdown};
use lbproxy::observability::{logging, metrics};
use lbproxy::HttpServer;

#[derive(Parser)]
#[command(name = "lbproxy")]
#[command(about = "HTTP load balancer with health checks and per-client rate limiting", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend URLs, replacing `pool.backends`
    #[arg(short, long, value_delimiter = ',')]
    backends: Vec<String>,

    /// Balancing method, replacing `pool.method`
    #[arg(short, long, value_enum)]
    method: Option<BalancingMethod>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => ProxyConfig::default(),
    };
    if !cli.backends.is_empty() {
        config.pool.backends = cli.backends;
    }
    if let Some(method) = cli.method {
        config.pool.method = method;
    }
    let config = config::finalize(config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lbproxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        method = config.pool.method.as_str(),
        backends = config.pool.backends.len(),
        health_checks = config.health_check.enabled,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    // Subscribes every shutdown receiver before the signal task can fire.
    let running = server.run(listener, shutdown.clone());
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    running.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
