//! Gateway transport errors.

use crate::config::ConfigError;

/// Errors from calls to external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure, including client-side timeouts.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Non-2xx response.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 2xx response whose body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http { source, .. } if source.is_timeout())
    }
}
