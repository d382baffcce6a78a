//! Proof service adapters.
//!
//! The proof is opaque here as everywhere else: the HTTP adapter forwards
//! whatever JSON the service returns, and the development service returns
//! a deterministic commitment that no verifier would accept.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;
use xfer_core::{ProofBundle, ProofError, ProofRequest, ProofService};

use crate::error::GatewayError;

/// `POST {base}/api/v1/proofs`.
#[derive(Debug, Clone)]
pub struct HttpProofService {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpProofService {
    /// `timeout` must match the one configured on `http`; it is only
    /// used for reporting.
    pub fn new(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    /// Call the service and return its bundle.
    pub async fn request_proof(&self, req: &ProofRequest) -> Result<ProofBundle, GatewayError> {
        let endpoint = "POST /api/v1/proofs";
        let url = crate::endpoint(&self.base_url, "api/v1/proofs");

        let resp = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| GatewayError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = crate::error_body(resp).await;
            return Err(GatewayError::Api {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| GatewayError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}

#[async_trait]
impl ProofService for HttpProofService {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofBundle, ProofError> {
        self.request_proof(request).await.map_err(|e| {
            tracing::warn!(receiver_id = %request.receiver_id, error = %e, "proof request failed");
            match e {
                e if e.is_timeout() => ProofError::Timeout(self.timeout),
                GatewayError::Api { status, body, .. } if (400..500).contains(&status) => {
                    ProofError::Rejected(format!("{status}: {body}"))
                }
                other => ProofError::Unavailable(other.to_string()),
            }
        })
    }
}

/// Deterministic stand-in used when no proof service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevProofService;

#[async_trait]
impl ProofService for DevProofService {
    async fn generate(&self, request: &ProofRequest) -> Result<ProofBundle, ProofError> {
        let mut hasher = Sha256::new();
        hasher.update(request.receiver_id.get().to_be_bytes());
        hasher.update(request.organization_id.get().to_be_bytes());
        hasher.update(request.receiver_reference.as_str().as_bytes());
        let commitment = format!("0x{}", hex::encode(hasher.finalize()));

        Ok(ProofBundle {
            proof: json!({ "scheme": "dev-sha256", "commitment": commitment }),
            public_inputs: vec![
                request.receiver_id.to_string(),
                request.organization_id.to_string(),
                commitment,
            ],
        })
    }
}
