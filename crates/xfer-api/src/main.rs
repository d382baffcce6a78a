//! # xfer-api — Binary Entry Point
//!
//! Reads configuration from the environment, connects the ledger store and
//! the external collaborators, and serves until ctrl-c.

use std::sync::Arc;

use anyhow::Context;
use xfer_api::state::{orchestrator_config, AppConfig, AppState, LogFormat};
use xfer_gateway::{Collaborators, GatewayConfig};
use xfer_ledger::{InMemoryLedgerStore, LedgerStore, PgLedgerStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid service configuration")?;
    init_tracing(config.log_format);

    let gateway = GatewayConfig::from_env().context("invalid gateway configuration")?;
    tracing::info!(?config, ?gateway, "configuration loaded");

    let (store, db_pool) = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pg = PgLedgerStore::connect(&url)
                .await
                .context("database initialization failed")?;
            let pool = pg.pool().clone();
            let store: Arc<dyn LedgerStore> = Arc::new(pg);
            (store, Some(pool))
        }
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set; using in-memory ledger store, balances are not durable"
            );
            let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
            (store, None)
        }
    };

    let collaborators =
        Collaborators::from_config(&gateway).context("failed to build collaborator clients")?;
    let state = AppState::new(
        store,
        collaborators,
        orchestrator_config(&gateway),
        db_pool,
        config.clone(),
    );
    let app = xfer_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("xfer-api listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
