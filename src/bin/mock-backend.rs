//! Stand-in upstream for trying the load balancer by hand.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Minimal HTTP backend answering / and /health", long_about = None)]
struct Cli {
    #[arg(short, long)]
    port: u16,

    /// Name echoed in responses; defaults to `backend-{port}`
    #[arg(short, long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let name: Arc<str> = cli
        .name
        .unwrap_or_else(|| format!("backend-{}", cli.port))
        .into();

    let app = Router::new()
        .route(
            "/",
            get(|State(name): State<Arc<str>>| async move { format!("Hello from {}\n", name) }),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(name.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(name = %name, address = %addr, "Mock backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
