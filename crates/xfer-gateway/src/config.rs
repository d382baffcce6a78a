//! Collaborator endpoint configuration.
//!
//! Every URL is optional. A missing URL selects the development stand-in
//! for that collaborator (see the crate docs).

use url::Url;

/// Endpoints, credentials and timeouts for the external collaborators.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub proof_service_url: Option<Url>,
    pub chain_gateway_url: Option<Url>,
    pub event_webhook_url: Option<Url>,
    /// Bearer token sent to every collaborator.
    pub api_token: Option<String>,
    pub proof_timeout_secs: u64,
    pub chain_timeout_secs: u64,
    pub event_timeout_ms: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("proof_service_url", &self.proof_service_url)
            .field("chain_gateway_url", &self.chain_gateway_url)
            .field("event_webhook_url", &self.event_webhook_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("proof_timeout_secs", &self.proof_timeout_secs)
            .field("chain_timeout_secs", &self.chain_timeout_secs)
            .field("event_timeout_ms", &self.event_timeout_ms)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            proof_service_url: None,
            chain_gateway_url: None,
            event_webhook_url: None,
            api_token: None,
            proof_timeout_secs: 60,
            chain_timeout_secs: 45,
            event_timeout_ms: 2_000,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PROOF_SERVICE_URL`, `CHAIN_GATEWAY_URL`, `EVENT_WEBHOOK_URL` (optional)
    /// - `GATEWAY_API_TOKEN` (optional)
    /// - `PROOF_TIMEOUT_SECS` (default: 60)
    /// - `CHAIN_TIMEOUT_SECS` (default: 45)
    /// - `EVENT_TIMEOUT_MS` (default: 2000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            proof_service_url: env_url("PROOF_SERVICE_URL")?,
            chain_gateway_url: env_url("CHAIN_GATEWAY_URL")?,
            event_webhook_url: env_url("EVENT_WEBHOOK_URL")?,
            api_token: std::env::var("GATEWAY_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            proof_timeout_secs: env_u64("PROOF_TIMEOUT_SECS", defaults.proof_timeout_secs)?,
            chain_timeout_secs: env_u64("CHAIN_TIMEOUT_SECS", defaults.chain_timeout_secs)?,
            event_timeout_ms: env_u64("EVENT_TIMEOUT_MS", defaults.event_timeout_ms)?,
        })
    }

    /// All three collaborators at one mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base` cannot be parsed.
    pub fn local_mock(base: &str, token: Option<&str>) -> Result<Self, ConfigError> {
        let url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?;
        let webhook = url
            .join("events")
            .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?;
        Ok(Self {
            proof_service_url: Some(url.clone()),
            chain_gateway_url: Some(url),
            event_webhook_url: Some(webhook),
            api_token: token.map(str::to_string),
            proof_timeout_secs: 5,
            chain_timeout_secs: 5,
            event_timeout_ms: 500,
        })
    }
}

fn env_url(var: &str) -> Result<Option<Url>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => Url::parse(raw.trim())
            .map(Some)
            .map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string())),
        _ => Ok(None),
    }
}

fn env_u64(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidNumber(var.to_string(), raw)),
            Ok(n) => Ok(n),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{0} must be a positive integer, got {1:?}")]
    InvalidNumber(String, String),
    #[error("GATEWAY_API_TOKEN contains characters not allowed in a header")]
    InvalidToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timeouts() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.proof_timeout_secs, 60);
        assert_eq!(cfg.chain_timeout_secs, 45);
        assert_eq!(cfg.event_timeout_ms, 2_000);
        assert!(cfg.chain_gateway_url.is_none());
    }

    #[test]
    fn local_mock_points_everything_at_base() {
        let cfg = GatewayConfig::local_mock("http://127.0.0.1:9000", Some("t")).unwrap();
        assert_eq!(cfg.proof_service_url.unwrap().as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.event_webhook_url.unwrap().as_str(), "http://127.0.0.1:9000/events");
        assert_eq!(cfg.api_token.as_deref(), Some("t"));
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = GatewayConfig::local_mock("http://127.0.0.1:9000", Some("secret")).unwrap();
        let out = format!("{cfg:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_absent_is_none() {
        assert_eq!(env_url("XFER_TEST_UNSET_URL_91823").unwrap(), None);
    }

    #[test]
    fn env_url_rejects_invalid() {
        std::env::set_var("XFER_TEST_BAD_URL", "not a url");
        let result = env_url("XFER_TEST_BAD_URL");
        std::env::remove_var("XFER_TEST_BAD_URL");
        assert!(result.is_err());
    }

    #[test]
    fn env_u64_rejects_zero_and_garbage() {
        std::env::set_var("XFER_TEST_ZERO_TIMEOUT", "0");
        assert!(env_u64("XFER_TEST_ZERO_TIMEOUT", 5).is_err());
        std::env::set_var("XFER_TEST_ZERO_TIMEOUT", "ten");
        assert!(env_u64("XFER_TEST_ZERO_TIMEOUT", 5).is_err());
        std::env::remove_var("XFER_TEST_ZERO_TIMEOUT");
        assert_eq!(env_u64("XFER_TEST_ZERO_TIMEOUT", 5).unwrap(), 5);
    }
}
