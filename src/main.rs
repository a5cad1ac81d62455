//! CapyMES Dashboard - Main Entry Point
//!
//! Headless service exposing the MES back-office commands over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use mes_dashboard_lib::{config::Config, logging, server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    logging::init(&config.log_dir());
    info!("CapyMES dashboard starting...");
    info!("Backend: {}, data: {}", config.api_url, config.data_dir.display());

    let state = Arc::new(AppState::from_config(&config)?);
    state.connection.set_mode(config.connection_mode);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    server::serve(listener, state).await.context("HTTP server stopped")?;
    Ok(())
}
