// Character Ranking - Web Server
// REST API with Axum over the SQLite store and the character directory

use anyhow::{Context, Result};
use character_ranking::{api, Config, HttpDirectory, RankingService, Store};
use std::sync::Arc;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("character_ranking=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {:?}", config.database_path))?;
    info!(path = ?config.database_path, "database opened");

    let directory = HttpDirectory::new(&config.directory_url, config.directory_timeout)
        .context("Failed to build directory client")?;
    info!(url = %config.directory_url, "directory configured");

    let service = RankingService::new(store, Arc::new(directory), config.directory_timeout);
    let app = api::router(service);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(version = character_ranking::VERSION, "server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
