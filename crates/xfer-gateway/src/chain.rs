//! # Chain Gateway Adapters
//!
//! [`HttpChainGateway`] submits a settlement and blocks until the gateway
//! reports the transaction committed or failed. Failures arrive as
//!
//! ```json
//! {"error": {"kind": "insufficient_allowance", "message": "...", "revert_reason": "..."}}
//! ```
//!
//! where `kind` is optional. An untyped failure that carries a revert
//! reason is classified from the reason text; anything else is a generic
//! revert (4xx) or an unavailable gateway (5xx, transport errors).
//!
//! A 2xx whose body is not a receipt is [`ChainFailureKind::OutcomeUnknown`]:
//! the gateway claimed success, so the transaction may be on chain. Any
//! `tx_hash` found in the body is kept for reconciliation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;
use xfer_core::{ChainError, ChainFailureKind, ChainGateway, Receipt, SettlementRequest};

use crate::error::GatewayError;

/// `POST {base}/api/v1/settlements`.
#[derive(Debug, Clone)]
pub struct HttpChainGateway {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    revert_reason: Option<String>,
}

impl HttpChainGateway {
    /// `timeout` must match the one configured on `http`; it is only
    /// used for reporting.
    pub fn new(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    async fn send(&self, req: &SettlementRequest) -> Result<Receipt, ChainError> {
        let endpoint = "POST /api/v1/settlements";
        let url = crate::endpoint(&self.base_url, "api/v1/settlements");

        let resp = self.http.post(&url).json(req).send().await.map_err(|e| {
            let err = GatewayError::Http {
                endpoint: endpoint.into(),
                source: e,
            };
            if err.is_timeout() {
                ChainError::new(
                    ChainFailureKind::Timeout,
                    format!("no settlement confirmation within {:?}", self.timeout),
                )
            } else {
                ChainError::new(ChainFailureKind::Unavailable, err.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            let body = crate::error_body(resp).await;
            return parse_receipt(status.as_u16(), &body);
        }

        let body = crate::error_body(resp).await;
        Err(parse_failure(status.as_u16(), &body))
    }
}

/// Decode a 2xx body. Anything but a full receipt is an unknown outcome.
fn parse_receipt(status: u16, body: &str) -> Result<Receipt, ChainError> {
    serde_json::from_str::<Receipt>(body).map_err(|e| {
        let tx_hash = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("tx_hash").and_then(|h| h.as_str()).map(str::to_string));
        ChainError::outcome_unknown(
            format!("chain gateway returned {status} without a readable receipt: {e}"),
            tx_hash,
        )
    })
}

/// Turn a non-2xx gateway response into a typed failure.
fn parse_failure(status: u16, body: &str) -> ChainError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let Some(err) = parsed else {
        let kind = if status >= 500 {
            ChainFailureKind::Unavailable
        } else {
            ChainFailureKind::Reverted
        };
        return ChainError::new(kind, format!("chain gateway returned {status}: {body}"));
    };

    let typed = err.kind.as_deref().and_then(failure_kind);
    match (typed, err.revert_reason) {
        (Some(kind), revert_reason) => ChainError {
            kind,
            message: err
                .message
                .unwrap_or_else(|| format!("chain gateway returned {status}")),
            revert_reason,
            tx_hash: None,
        },
        (None, Some(reason)) => ChainError::reverted(reason),
        (None, None) => ChainError::new(
            if status >= 500 {
                ChainFailureKind::Unavailable
            } else {
                ChainFailureKind::Reverted
            },
            err.message
                .unwrap_or_else(|| format!("chain gateway returned {status}")),
        ),
    }
}

fn failure_kind(kind: &str) -> Option<ChainFailureKind> {
    match kind.to_ascii_lowercase().as_str() {
        "insufficient_balance" => Some(ChainFailureKind::InsufficientBalance),
        "insufficient_allowance" => Some(ChainFailureKind::InsufficientAllowance),
        "nullifier_already_used" => Some(ChainFailureKind::NullifierAlreadyUsed),
        "reverted" => Some(ChainFailureKind::Reverted),
        "timeout" => Some(ChainFailureKind::Timeout),
        "unavailable" => Some(ChainFailureKind::Unavailable),
        _ => None,
    }
}

#[async_trait]
impl ChainGateway for HttpChainGateway {
    async fn submit(&self, request: &SettlementRequest) -> Result<Receipt, ChainError> {
        let result = self.send(request).await;
        match &result {
            Ok(receipt) => tracing::info!(
                tx_hash = %receipt.tx_hash,
                block_number = receipt.block_number,
                "settlement committed"
            ),
            Err(e) if e.may_have_committed() => tracing::error!(
                tx_hash = ?e.tx_hash,
                error = %e,
                "settlement outcome unknown; reconciliation required"
            ),
            Err(e) => tracing::warn!(kind = ?e.kind, error = %e, "settlement failed"),
        }
        result
    }
}

/// Refuses every settlement. Used when no chain gateway is configured so
/// that cross-organization transfers fail cleanly before any ledger write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledChainGateway;

#[async_trait]
impl ChainGateway for DisabledChainGateway {
    async fn submit(&self, _request: &SettlementRequest) -> Result<Receipt, ChainError> {
        Err(ChainError::new(
            ChainFailureKind::Unavailable,
            "no chain gateway is configured",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_kind_wins_over_reason_text() {
        let err = parse_failure(
            422,
            r#"{"error":{"kind":"insufficient_allowance","revert_reason":"paused"}}"#,
        );
        assert_eq!(err.kind, ChainFailureKind::InsufficientAllowance);
        assert_eq!(err.revert_reason.as_deref(), Some("paused"));
    }

    #[test]
    fn untyped_reason_is_classified() {
        let err = parse_failure(
            409,
            r#"{"error":{"revert_reason":"Nullifier already used"}}"#,
        );
        assert_eq!(err.kind, ChainFailureKind::NullifierAlreadyUsed);
    }

    #[test]
    fn unknown_kind_falls_back_to_reason() {
        let err = parse_failure(
            400,
            r#"{"error":{"kind":"mystery","revert_reason":"ERC20: transfer amount exceeds balance"}}"#,
        );
        assert_eq!(err.kind, ChainFailureKind::InsufficientBalance);
    }

    #[test]
    fn success_without_receipt_keeps_the_hash() {
        let err = parse_receipt(200, r#"{"tx_hash":"0xfeed","status":"committed"}"#).unwrap_err();
        assert_eq!(err.kind, ChainFailureKind::OutcomeUnknown);
        assert_eq!(err.tx_hash.as_deref(), Some("0xfeed"));

        let err = parse_receipt(200, "ok").unwrap_err();
        assert_eq!(err.kind, ChainFailureKind::OutcomeUnknown);
        assert_eq!(err.tx_hash, None);
    }

    #[test]
    fn unparseable_bodies_split_on_status() {
        assert_eq!(parse_failure(502, "bad gateway").kind, ChainFailureKind::Unavailable);
        assert_eq!(parse_failure(400, "nope").kind, ChainFailureKind::Reverted);
    }
}
