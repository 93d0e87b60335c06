//! neon-gateway server entry point.
//!
//! Loads configuration, opens the document store, and serves the gateway
//! until ctrl-c. Shutdown closes the event bus first so that open event
//! streams end and the graceful drain can complete.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use neon_gateway::api;
use neon_gateway::app_state::AppState;
use neon_gateway::auth::AuthGate;
use neon_gateway::config::{GatewayConfig, LogFormat, StoreBackend};
use neon_gateway::domain::EventBus;
use neon_gateway::store::{DocumentStore, MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first: it decides the log format
    let config = GatewayConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.store_backend,
        "starting neon-gateway"
    );

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(config.change_feed_capacity)),
        StoreBackend::Postgres => Arc::new(
            PostgresStore::connect(&config)
                .await
                .context("connecting to PostgreSQL")?,
        ),
    };

    let auth = AuthGate::from_config(&config);
    let event_bus = EventBus::new();
    let listen_addr = config.listen_addr;
    let app = api::build_app(AppState::new(config, store, auth, event_bus.clone()));

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(event_bus))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

async fn shutdown_signal(event_bus: EventBus) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested, closing event streams");
    event_bus.shutdown();
}
