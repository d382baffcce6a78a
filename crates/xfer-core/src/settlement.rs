//! # Settlement Value Types
//!
//! Requests, results and failures exchanged with the external collaborators
//! of a cross-organization transfer: the proof service, the chain gateway
//! and the event publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::amount::Amount;
use crate::error::{ErrorKind, TransferError};
use crate::identity::{AccountId, AccountReference, OrganizationId, WalletAddress};
use crate::memo::Memo;
use crate::nullifier::Nullifier;

// ── Proof service ──────────────────────────────────────────────────

/// Identity of the receiver for whom a proof is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub receiver_id: AccountId,
    pub receiver_reference: AccountReference,
    pub organization_id: OrganizationId,
}

/// Opaque proof material. Never inspected by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: Value,
    pub public_inputs: Vec<String>,
}

/// Proof service failures. All map to `PROOF_GENERATION_FAILED`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The service answered and refused.
    #[error("proof service rejected the request: {0}")]
    Rejected(String),

    /// Transport failure or unexpected response.
    #[error("proof service unavailable: {0}")]
    Unavailable(String),

    #[error("proof service timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<ProofError> for TransferError {
    fn from(err: ProofError) -> Self {
        TransferError::new(ErrorKind::ProofGenerationFailed, err.to_string())
    }
}

// ── Chain gateway ──────────────────────────────────────────────────

/// Parameters of one on-chain settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRequest {
    pub to_wallet: WalletAddress,
    pub amount: Amount,
    pub memo: Memo,
    pub nullifier: Nullifier,
    pub sender_reference: AccountReference,
    pub receiver_reference: AccountReference,
    pub proof: Value,
    pub public_inputs: Vec<String>,
}

/// Confirmation of a committed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub chain_id: u64,
    pub sender_wallet: String,
    pub receiver_wallet: String,
}

/// Typed chain failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFailureKind {
    InsufficientBalance,
    InsufficientAllowance,
    NullifierAlreadyUsed,
    /// Reverted for any other reason.
    Reverted,
    /// No answer within the deadline.
    Timeout,
    /// Gateway unreachable or misbehaving.
    Unavailable,
    /// The gateway answered 2xx but no receipt could be read. The
    /// transaction may have committed.
    OutcomeUnknown,
}

/// A failed settlement attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chain settlement failed ({kind:?}): {message}")]
pub struct ChainError {
    pub kind: ChainFailureKind,
    pub message: String,
    pub revert_reason: Option<String>,
    /// Transaction hash the gateway reported, if any was readable.
    pub tx_hash: Option<String>,
}

impl ChainError {
    pub fn new(kind: ChainFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            revert_reason: None,
            tx_hash: None,
        }
    }

    /// A 2xx answer without a readable receipt.
    pub fn outcome_unknown(message: impl Into<String>, tx_hash: Option<String>) -> Self {
        Self {
            kind: ChainFailureKind::OutcomeUnknown,
            message: message.into(),
            revert_reason: None,
            tx_hash,
        }
    }

    /// Whether the settlement may have committed despite the error.
    pub fn may_have_committed(&self) -> bool {
        self.kind == ChainFailureKind::OutcomeUnknown
    }

    /// A revert, with its kind refined from the reason text.
    pub fn reverted(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            kind: Self::classify(&reason),
            message: format!("transaction reverted: {reason}"),
            revert_reason: Some(reason),
            tx_hash: None,
        }
    }

    /// Map a free-text revert reason to a failure kind.
    pub fn classify(reason: &str) -> ChainFailureKind {
        let r = reason.to_ascii_lowercase();
        if r.contains("nullifier") {
            ChainFailureKind::NullifierAlreadyUsed
        } else if r.contains("allowance") {
            ChainFailureKind::InsufficientAllowance
        } else if r.contains("insufficient balance")
            || r.contains("exceeds balance")
            || r.contains("insufficient funds")
        {
            ChainFailureKind::InsufficientBalance
        } else {
            ChainFailureKind::Reverted
        }
    }
}

impl From<ChainError> for TransferError {
    fn from(err: ChainError) -> Self {
        let kind = match err.kind {
            ChainFailureKind::InsufficientBalance => ErrorKind::InsufficientBalance,
            ChainFailureKind::InsufficientAllowance => ErrorKind::InsufficientAllowance,
            ChainFailureKind::NullifierAlreadyUsed => ErrorKind::NullifierAlreadyUsed,
            ChainFailureKind::Reverted
            | ChainFailureKind::Timeout
            | ChainFailureKind::Unavailable
            | ChainFailureKind::OutcomeUnknown => ErrorKind::BlockchainTransferFailed,
        };
        let may_have_committed = err.may_have_committed();
        let mut details = serde_json::Map::new();
        if let Some(reason) = err.revert_reason {
            details.insert("revert_reason".into(), json!(reason));
        }
        if may_have_committed {
            details.insert("may_have_committed".into(), json!(true));
        }
        if let Some(tx_hash) = err.tx_hash {
            details.insert("tx_hash".into(), json!(tx_hash));
        }
        let out = TransferError::new(kind, err.message);
        if details.is_empty() {
            out
        } else {
            out.with_details(Value::Object(details))
        }
    }
}

// ── Event publisher ────────────────────────────────────────────────

/// Audit record for a committed cross-organization settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementEvent {
    pub transfer_id: Uuid,
    pub receipt: Receipt,
    pub amount: Amount,
    pub sender_reference: AccountReference,
    pub receiver_reference: AccountReference,
    pub nullifier: Nullifier,
    pub timestamp: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_revert_reasons() {
        assert_eq!(
            ChainError::classify("ERC20: insufficient allowance"),
            ChainFailureKind::InsufficientAllowance
        );
        assert_eq!(
            ChainError::classify("ERC20: transfer amount exceeds balance"),
            ChainFailureKind::InsufficientBalance
        );
        assert_eq!(
            ChainError::classify("Nullifier already used"),
            ChainFailureKind::NullifierAlreadyUsed
        );
        assert_eq!(
            ChainError::classify("Pausable: paused"),
            ChainFailureKind::Reverted
        );
    }

    #[test]
    fn chain_error_maps_to_taxonomy() {
        let cases = [
            (ChainFailureKind::InsufficientBalance, ErrorKind::InsufficientBalance),
            (ChainFailureKind::InsufficientAllowance, ErrorKind::InsufficientAllowance),
            (ChainFailureKind::NullifierAlreadyUsed, ErrorKind::NullifierAlreadyUsed),
            (ChainFailureKind::Reverted, ErrorKind::BlockchainTransferFailed),
            (ChainFailureKind::Timeout, ErrorKind::BlockchainTransferFailed),
            (ChainFailureKind::Unavailable, ErrorKind::BlockchainTransferFailed),
            (ChainFailureKind::OutcomeUnknown, ErrorKind::BlockchainTransferFailed),
        ];
        for (chain, expected) in cases {
            let err: TransferError = ChainError::new(chain, "x").into();
            assert_eq!(err.kind, expected);
        }
    }

    #[test]
    fn unknown_outcome_flags_possible_commit() {
        let err = ChainError::outcome_unknown("receipt unreadable", Some("0xfeed".into()));
        assert!(err.may_have_committed());
        let te: TransferError = err.into();
        assert_eq!(te.kind, ErrorKind::BlockchainTransferFailed);
        let details = te.details.unwrap();
        assert_eq!(details["may_have_committed"], true);
        assert_eq!(details["tx_hash"], "0xfeed");

        let plain: TransferError = ChainError::new(ChainFailureKind::Unavailable, "down").into();
        assert!(plain.details.is_none());
    }

    #[test]
    fn revert_reason_is_carried_in_details() {
        let err: TransferError = ChainError::reverted("Pausable: paused").into();
        assert_eq!(err.kind, ErrorKind::BlockchainTransferFailed);
        assert_eq!(err.details.unwrap()["revert_reason"], "Pausable: paused");
    }

    #[test]
    fn proof_errors_map_to_generation_failed() {
        let err: TransferError = ProofError::Unavailable("connection refused".into()).into();
        assert_eq!(err.kind, ErrorKind::ProofGenerationFailed);
    }
}
