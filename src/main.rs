//! plumb-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use plumb_relay::api;
use plumb_relay::app_state::AppState;
use plumb_relay::config::{DEV_JWT_SECRET, LogFormat, RelayConfig};
use plumb_relay::store::{MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting plumb-relay");
    if config.jwt_secret == DEV_JWT_SECRET {
        tracing::warn!("JWT_SECRET not set; using the development secret");
    }

    // Build storage and application state
    let app_state = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        let store = Arc::new(PostgresStore::new(pool));
        store.migrate().await?;
        tracing::info!("postgres store ready");
        AppState::new(&config, store)
    } else {
        tracing::warn!("persistence disabled; notifications and messages live in memory");
        AppState::new(&config, Arc::new(MemoryStore::new()))
    };

    // Build router
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
