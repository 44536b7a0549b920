pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod settings;
pub mod timer;
mod utils;

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use api::{router, AppState};
pub use client::ApiClient;
pub use config::ServerConfig;
pub use db::Database;
pub use settings::SettingsStore;

/// Opens the database and serves the API until `shutdown` fires.
pub async fn serve(config: ServerConfig, shutdown: CancellationToken) -> Result<()> {
    let db = Database::new(config.db_path.clone())?;
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    serve_on(listener, AppState::new(db, config.default_user), shutdown).await
}

/// Serves the API on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("taskfocus listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .context("HTTP server failed")?;

    info!("taskfocus server stopped");
    Ok(())
}
