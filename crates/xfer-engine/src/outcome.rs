//! # Transfer Outcome and Response Envelope
//!
//! [`TransferOutcome`] is the tagged result of one workflow run. Exactly one
//! of success, partial success or failure applies. [`TransferResponse`] is
//! its wire form:
//!
//! | Outcome | Envelope |
//! |---------|----------|
//! | same-organization success | `{success: true, transfer_type: "SAME_ORGANIZATION", database}` |
//! | cross-organization success | `{success: true, transfer_type: "CROSS_ORGANIZATION", blockchain, database}` |
//! | partial success | `{success: true, warning: "BLOCKCHAIN_SUCCEEDED_DATABASE_FAILED", blockchain, database: {error, type, details}}` |
//! | failure | `{success: false, error: {type, message, details?}}` |
//!
//! Every envelope also carries `transfer_id`.

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use xfer_core::{AccountReference, Amount, ErrorKind, Nullifier, Receipt, TransferError};
use xfer_ledger::LedgerTransfer;

/// Warning attached to a partial success.
pub const CHAIN_COMMITTED_LEDGER_FAILED: &str = "BLOCKCHAIN_SUCCEEDED_DATABASE_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    SameOrganization,
    CrossOrganization,
}

impl TransferType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameOrganization => "SAME_ORGANIZATION",
            Self::CrossOrganization => "CROSS_ORGANIZATION",
        }
    }
}

/// A committed chain settlement: the receipt plus what was submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSettlement {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub nullifier: Nullifier,
    pub memo: String,
    pub amount: Amount,
    pub sender_reference: AccountReference,
    pub receiver_reference: AccountReference,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Success {
        transfer_id: Uuid,
        transfer_type: TransferType,
        /// Present only for cross-organization transfers.
        blockchain: Option<ChainSettlement>,
        database: LedgerTransfer,
    },
    /// The chain committed; the ledger update did not.
    PartialSuccess {
        transfer_id: Uuid,
        blockchain: ChainSettlement,
        database_error: TransferError,
    },
    /// Nothing irreversible happened.
    Failure {
        transfer_id: Uuid,
        /// Set once routing decided.
        transfer_type: Option<TransferType>,
        error: TransferError,
    },
}

impl TransferOutcome {
    pub fn transfer_id(&self) -> Uuid {
        match self {
            Self::Success { transfer_id, .. }
            | Self::PartialSuccess { transfer_id, .. }
            | Self::Failure { transfer_id, .. } => *transfer_id,
        }
    }

    pub fn transfer_type(&self) -> Option<TransferType> {
        match self {
            Self::Success { transfer_type, .. } => Some(*transfer_type),
            Self::PartialSuccess { .. } => Some(TransferType::CrossOrganization),
            Self::Failure { transfer_type, .. } => *transfer_type,
        }
    }

    /// `true` for success and partial success.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// The hard-failure error, if any.
    pub fn error(&self) -> Option<&TransferError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::PartialSuccess { .. } => "partial_success",
            Self::Failure { .. } => "failure",
        }
    }

    pub fn to_response(&self) -> TransferResponse {
        match self {
            Self::Success {
                transfer_id,
                transfer_type,
                blockchain,
                database,
            } => TransferResponse {
                success: true,
                transfer_id: *transfer_id,
                transfer_type: Some(*transfer_type),
                warning: None,
                blockchain: blockchain.clone(),
                database: Some(DatabaseSection::Applied(database.clone())),
                error: None,
            },
            Self::PartialSuccess {
                transfer_id,
                blockchain,
                database_error,
            } => TransferResponse {
                success: true,
                transfer_id: *transfer_id,
                transfer_type: Some(TransferType::CrossOrganization),
                warning: Some(CHAIN_COMMITTED_LEDGER_FAILED.to_string()),
                blockchain: Some(blockchain.clone()),
                database: Some(DatabaseSection::Failed(DatabaseFailure {
                    error: database_error.message.clone(),
                    kind: database_error.kind,
                    details: database_error.details.clone(),
                })),
                error: None,
            },
            Self::Failure {
                transfer_id, error, ..
            } => TransferResponse {
                success: false,
                transfer_id: *transfer_id,
                transfer_type: None,
                warning: None,
                blockchain: None,
                database: None,
                error: Some(error.clone()),
            },
        }
    }
}

/// The `database` member of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DatabaseSection {
    Applied(LedgerTransfer),
    Failed(DatabaseFailure),
}

/// Ledger failure reported inside a partial success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseFailure {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Response envelope for `POST /v1/transfers`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransferResponse {
    pub success: bool,
    pub transfer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_type: Option<TransferType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "BLOCKCHAIN_SUCCEEDED_DATABASE_FAILED")]
    pub warning: Option<String>,
    /// Chain receipt with nullifier, memo, amount and references.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub blockchain: Option<ChainSettlement>,
    /// Ledger result, or `{error, type, details}` after a partial success.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub database: Option<DatabaseSection>,
    /// `{type, message, details?}` on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub error: Option<TransferError>,
}
