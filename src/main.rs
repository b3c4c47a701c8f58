//! floorplan-gateway server entry point.
//!
//! Starts the Axum HTTP server with the layout REST endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use floorplan_gateway::api;
use floorplan_gateway::app_state::AppState;
use floorplan_gateway::config::{GatewayConfig, LogFormat, StoreBackend};
use floorplan_gateway::store::{DocumentStore, MemoryDocumentStore, PostgresDocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.store_backend,
        "starting floorplan-gateway"
    );

    // Build storage layer
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory document store; layouts are lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
        StoreBackend::Postgres => Arc::new(
            PostgresDocumentStore::connect(
                &config.database_url,
                config.database_max_connections,
                config.database_min_connections,
                Duration::from_secs(config.database_connect_timeout_secs),
            )
            .await
            .context("failed to connect to PostgreSQL")?,
        ),
    };

    // Build application state and router
    let app_state = AppState::new(store, config.transaction_max_attempts);
    let app = api::build_app(app_state, Duration::from_secs(config.request_timeout_secs));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
