// Vitals Sheet - Web Server
// Reads settings from flags/env, opens the store, serves the records API.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vitals_sheet::{api, logging, Recorder, ServerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = ServerSettings::parse();
    logging::init(&settings.log).context("Failed to initialize logging")?;

    // Missing spreadsheet id or credentials stops the process here
    let store = settings
        .store
        .build()
        .context("Failed to open record store")?;
    let config = settings
        .recorder_config()
        .context("Invalid recorder settings")?;

    info!(
        backend = store.backend_name(),
        default_category = %config.default_category,
        read_limit = %config.default_limit,
        serialize_writes = config.serialize_writes,
        "store ready"
    );

    let recorder = Arc::new(Recorder::new(store, config));
    let app = api::router(recorder);

    let addr = settings.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed
        std::future::pending::<()>().await;
    }
}
