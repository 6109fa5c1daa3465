//! # Tradeflow API server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Startup Sequence                                │
//! │                                                                         │
//! │  .env + tradeflow.toml + TRADEFLOW__* ──► ApiConfig::load (validated)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tracing (RUST_LOG, default info,tradeflow=debug,sqlx=warn)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new ──► WAL + foreign keys + migrations                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  axum::serve(listener, app) ──► Ctrl-C / SIGTERM ──► drain, close pool  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tradeflow_api::{app, ApiConfig, AppState};
use tradeflow_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::load().context("Failed to load configuration")?;

    init_tracing();
    info!("Starting Tradeflow API server...");
    if config.uses_dev_secret() {
        warn!("Using the development JWT secret; set TRADEFLOW__AUTH__JWT_SECRET in production");
    }
    if !config.zoho.is_configured() {
        warn!("Zoho client credentials are not configured; Zoho sync is disabled");
    }

    let db = Database::new(config.db_config())
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    info!(path = %config.database.path, "Database ready");

    let addr = config.bind_addr()?;
    let state = AppState::new(config, db.clone())?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tradeflow=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
