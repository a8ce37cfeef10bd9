mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ApiError;
pub use handlers::{PredictionRequest, PredictionResponse, ReportsResponse};
pub use state::AppState;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!(address = %addr, pid = std::process::id(), "drift service listening");

    let shutdown_signal = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c, shutting down");
        }
        info!("shutdown signal received, draining connections");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("http server failed")?;

    info!("drift service stopped");
    Ok(())
}
