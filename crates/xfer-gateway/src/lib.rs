//! # xfer-gateway — Adapters for External Settlement Collaborators
//!
//! Implements the `xfer-core` ports against real services:
//!
//! | Port | HTTP adapter | Fallback when unconfigured |
//! |------|--------------|----------------------------|
//! | `ProofService` | [`HttpProofService`] (`POST /api/v1/proofs`) | [`DevProofService`] |
//! | `ChainGateway` | [`HttpChainGateway`] (`POST /api/v1/settlements`) | [`DisabledChainGateway`] |
//! | `EventPublisher` | [`WebhookEventPublisher`] | [`LogEventPublisher`] |
//!
//! Every HTTP adapter has a client-level timeout taken from
//! [`GatewayConfig`]. The orchestrator applies its own deadline on top.

pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod proof;

pub use chain::{DisabledChainGateway, HttpChainGateway};
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use events::{LogEventPublisher, WebhookEventPublisher};
pub use proof::{DevProofService, HttpProofService};

use std::sync::Arc;
use std::time::Duration;

use xfer_core::{ChainGateway, EventPublisher, ProofService};

/// The three collaborators a transfer orchestrator needs.
#[derive(Clone)]
pub struct Collaborators {
    pub proof: Arc<dyn ProofService>,
    pub chain: Arc<dyn ChainGateway>,
    pub events: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Build adapters from configuration, substituting development
    /// stand-ins for any service without a URL.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let proof: Arc<dyn ProofService> = match &config.proof_service_url {
            Some(url) => {
                let timeout = Duration::from_secs(config.proof_timeout_secs);
                Arc::new(HttpProofService::new(
                    http_client(config, timeout)?,
                    url.clone(),
                    timeout,
                ))
            }
            None => {
                tracing::warn!("PROOF_SERVICE_URL not set; using deterministic development proofs");
                Arc::new(DevProofService)
            }
        };

        let chain: Arc<dyn ChainGateway> = match &config.chain_gateway_url {
            Some(url) => {
                let timeout = Duration::from_secs(config.chain_timeout_secs);
                Arc::new(HttpChainGateway::new(
                    http_client(config, timeout)?,
                    url.clone(),
                    timeout,
                ))
            }
            None => {
                tracing::warn!(
                    "CHAIN_GATEWAY_URL not set; cross-organization transfers will be refused"
                );
                Arc::new(DisabledChainGateway)
            }
        };

        let events: Arc<dyn EventPublisher> = match &config.event_webhook_url {
            Some(url) => Arc::new(WebhookEventPublisher::new(
                http_client(config, Duration::from_millis(config.event_timeout_ms))?,
                url.clone(),
            )),
            None => Arc::new(LogEventPublisher),
        };

        Ok(Self {
            proof,
            chain,
            events,
        })
    }
}

/// A `reqwest` client with the given timeout and, when configured, a
/// bearer token on every request.
pub(crate) fn http_client(
    config: &GatewayConfig,
    timeout: Duration,
) -> Result<reqwest::Client, GatewayError> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(token) = &config.api_token {
        let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| GatewayError::Config(ConfigError::InvalidToken))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| GatewayError::Http {
            endpoint: "client_init".into(),
            source: e,
        })
}

/// `{base}/{path}` regardless of whether `base` ends in a slash.
pub(crate) fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

/// Read a non-2xx body for error reporting.
pub(crate) async fn error_body(resp: reqwest::Response) -> String {
    resp.text()
        .await
        .unwrap_or_else(|e| format!("<failed to read response body: {e}>"))
}
