//! Tradecast API Server
//!
//! WebSocket server that fans client trade events out to every connected
//! client and persists them in the background.

mod routes;

use anyhow::Context;
use axum::Router;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tradecast_services::{
    load_env_file, ConnectionRegistry, EnvParameterResolver, FileOperationalLog,
    HttpTopicPublisher, HubConfig, HubState, OpsLogger, PersistencePipeline, SqliteTradeStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: HubState,
    pub started_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = load_env_file(".env.local") {
        eprintln!("Warning: {}", e);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,tradecast_api=debug,tradecast_services=debug")
            }),
        )
        .init();

    info!("Starting Tradecast hub");
    let started_at = Utc::now();

    // Resolve deployment parameters
    let resolver = EnvParameterResolver::new();
    let config = HubConfig::resolve(&resolver)
        .await
        .context("Failed to resolve hub configuration")?;

    // Operational log stream must exist before anything else is logged to it
    let log_sink = FileOperationalLog::create(
        &config.log_group,
        &FileOperationalLog::stream_name_for(started_at),
    )
    .await
    .context("Failed to create operational log stream")?;
    let ops = OpsLogger::new(Arc::new(log_sink));
    ops.info("Starting WebSocket server...").await;

    // Initialize trade store (SQLite database)
    info!("Initializing trade store at: {}", config.store_name);
    let store = SqliteTradeStore::open(&config.store_name)
        .context("Failed to initialize trade store")?;

    let publisher =
        HttpTopicPublisher::new(&config.topic).context("Failed to initialize topic publisher")?;
    info!("Publishing persisted trades to {}", publisher.topic());

    // Start persistence workers. Shutdown does not wait for them to drain.
    let pipeline = Arc::new(PersistencePipeline::new(
        Arc::new(store),
        Arc::new(publisher),
        ops.clone(),
    ));
    let (queue, _workers) = pipeline.spawn(&config.persistence);

    let hub = HubState::new(Arc::new(ConnectionRegistry::new()), queue, ops.clone());
    let state = AppState { hub, started_at };

    // Clients connect from anywhere; there is no origin check
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::ws_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    ops.info(format!("WebSocket server running on {}", addr)).await;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ops.info("WebSocket server stopped").await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
