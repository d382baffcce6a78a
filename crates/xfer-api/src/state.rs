//! # Application State
//!
//! Shared state handed to every handler: the orchestrator (which owns the
//! ledger store and collaborator handles), the metrics registry, the
//! optional database pool for readiness checks, and the service config.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;
use xfer_engine::{OrchestratorConfig, TransferOrchestrator};
use xfer_gateway::{Collaborators, GatewayConfig};
use xfer_ledger::LedgerStore;

use crate::middleware::metrics::ApiMetrics;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Service configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppConfigError {
    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),

    #[error("LOG_FORMAT must be \"text\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN` and `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppConfigError::InvalidPort(raw))?,
            None => 8080,
        };
        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.trim().is_empty());
        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(AppConfigError::InvalidLogFormat(other.to_string())),
        };
        Ok(Self {
            port,
            auth_token,
            log_format,
        })
    }
}

/// Orchestrator timeouts taken from the gateway's per-service settings.
pub fn orchestrator_config(gateway: &GatewayConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        proof_timeout: Duration::from_secs(gateway.proof_timeout_secs),
        chain_timeout: Duration::from_secs(gateway.chain_timeout_secs),
        publish_timeout: Duration::from_millis(gateway.event_timeout_ms),
        ..OrchestratorConfig::default()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub metrics: ApiMetrics,
    /// Present when running against PostgreSQL.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        collaborators: Collaborators,
        orchestrator: OrchestratorConfig,
        db_pool: Option<PgPool>,
        config: AppConfig,
    ) -> Self {
        let orchestrator = TransferOrchestrator::new(
            store,
            collaborators.proof,
            collaborators.chain,
            collaborators.events,
            orchestrator,
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            metrics: ApiMetrics::new(),
            db_pool,
            config,
        }
    }
}
