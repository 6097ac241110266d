//! grabhub — real-time state-broadcast hub for the grab engine.
//!
//! UI clients connect over one WebSocket at `/api/ws`, subscribe to named
//! state channels, and receive a snapshot followed by live coalesced
//! batches until they unsubscribe or disconnect.

mod config;
mod handlers;
mod hub;
mod metrics;
mod models;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::{FileConfig, HubConfig, load_config};
use hub::registry::SubscriptionRegistry;
use metrics::ServerMetrics;
use state::StateExchange;

#[derive(Parser, Debug)]
#[command(name = "grabhub", about = "Real-time state-broadcast hub for the grab engine")]
struct Cli {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (config.toml lives here)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<StateExchange>,
    pub registry: Arc<SubscriptionRegistry>,
    pub hub_config: Arc<HubConfig>,
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "grab_hub=debug,tower_http=debug,info"
    } else {
        "grab_hub=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let file_config: FileConfig = load_config(&data_dir)
        .extract()
        .context("invalid configuration")?;

    let host = cli
        .host
        .or_else(|| file_config.server.host.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cli.port.or(file_config.server.port).unwrap_or(8080);
    let hub_config = Arc::new(HubConfig::from_file(&file_config.hub));

    let state = AppState {
        exchange: Arc::new(StateExchange::new(hub_config.feed_capacity)),
        registry: Arc::new(SubscriptionRegistry::new()),
        hub_config,
        metrics: Arc::new(ServerMetrics::new()),
    };

    let app = Router::new()
        .route("/api/ws", get(handlers::ws_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("grabhub listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
