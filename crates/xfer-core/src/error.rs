//! # Transfer Error Taxonomy
//!
//! [`ErrorKind`] is the closed set of machine-readable error types a
//! transfer can report. [`TransferError`] pairs a kind with a
//! human-readable message and optional structured details, and is the
//! exact shape of the `error` object in a failure envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Machine-readable error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed request fields.
    InvalidInput,
    /// Sender or receiver account does not exist.
    UserNotFound,
    /// An account's organization does not exist.
    OrganizationNotFound,
    /// The proof service failed or timed out.
    ProofGenerationFailed,
    /// The canonical memo exceeds the byte bound.
    MemoTooLong,
    /// Sender cannot cover the amount.
    InsufficientBalance,
    /// The on-chain spend allowance is too low.
    InsufficientAllowance,
    /// The nullifier has already been consumed on chain.
    NullifierAlreadyUsed,
    /// Any other chain-side failure.
    BlockchainTransferFailed,
    /// Optimistic-lock retries were exhausted.
    ConcurrentModification,
    /// Ledger store failure.
    DatabaseError,
    /// Unexpected internal failure.
    InternalError,
}

impl ErrorKind {
    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::OrganizationNotFound => "ORGANIZATION_NOT_FOUND",
            Self::ProofGenerationFailed => "PROOF_GENERATION_FAILED",
            Self::MemoTooLong => "MEMO_TOO_LONG",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance => "INSUFFICIENT_ALLOWANCE",
            Self::NullifierAlreadyUsed => "NULLIFIER_ALREADY_USED",
            Self::BlockchainTransferFailed => "BLOCKCHAIN_TRANSFER_FAILED",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reportable transfer error.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TransferError {
    /// Machine-readable type.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Causally relevant context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TransferError {
    /// An error without details.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn user_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserNotFound, message)
    }

    pub fn organization_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OrganizationNotFound, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DatabaseError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_value(ErrorKind::NullifierAlreadyUsed).unwrap(),
            json!("NULLIFIER_ALREADY_USED")
        );
        let parsed: ErrorKind = serde_json::from_value(json!("MEMO_TOO_LONG")).unwrap();
        assert_eq!(parsed, ErrorKind::MemoTooLong);
    }

    #[test]
    fn as_str_matches_serde_name() {
        let all = [
            ErrorKind::InvalidInput,
            ErrorKind::UserNotFound,
            ErrorKind::OrganizationNotFound,
            ErrorKind::ProofGenerationFailed,
            ErrorKind::MemoTooLong,
            ErrorKind::InsufficientBalance,
            ErrorKind::InsufficientAllowance,
            ErrorKind::NullifierAlreadyUsed,
            ErrorKind::BlockchainTransferFailed,
            ErrorKind::ConcurrentModification,
            ErrorKind::DatabaseError,
            ErrorKind::InternalError,
        ];
        for kind in all {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }

    #[test]
    fn error_object_uses_type_field_and_omits_empty_details() {
        let err = TransferError::user_not_found("sender 9 not found");
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v, json!({"type": "USER_NOT_FOUND", "message": "sender 9 not found"}));

        let with = err.with_details(json!({"sender_id": 9}));
        let v = serde_json::to_value(&with).unwrap();
        assert_eq!(v["details"]["sender_id"], 9);
    }

    #[test]
    fn display_includes_kind() {
        let err = TransferError::internal("boom");
        assert_eq!(err.to_string(), "INTERNAL_ERROR: boom");
    }
}
