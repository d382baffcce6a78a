//! # Transfer Memo Codec
//!
//! Builds the memo attached to a cross-organization settlement and checks
//! its size. The memo is the JCS canonical form of [`TransferMemo`]; the
//! bound of [`MAX_MEMO_BYTES`] applies to its UTF-8 byte length.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::amount::Amount;
use crate::canonical::{CanonicalJson, CanonicalizationError};
use crate::error::{ErrorKind, TransferError};
use crate::identity::{AccountReference, WalletAddress};

/// Maximum serialized memo size in bytes.
pub const MAX_MEMO_BYTES: usize = 1024;

/// Memo build and validation failures.
#[derive(Error, Debug)]
pub enum MemoError {
    #[error("memo is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("memo canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl From<MemoError> for TransferError {
    fn from(err: MemoError) -> Self {
        match err {
            MemoError::TooLong { len, max } => {
                TransferError::new(ErrorKind::MemoTooLong, format!("memo exceeds {max} bytes"))
                    .with_details(json!({ "length": len, "max_length": max }))
            }
            MemoError::Canonicalization(e) => TransferError::internal(e.to_string()),
        }
    }
}

/// The structured memo content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMemo {
    pub sender_reference: String,
    pub receiver_reference: String,
    pub sender_wallet: String,
    pub receiver_wallet: String,
    pub amount: Amount,
    /// UTC, second precision, `Z` suffix.
    pub timestamp: String,
}

impl TransferMemo {
    /// Assemble memo content stamped with the current time.
    ///
    /// Missing references are encoded as empty strings.
    pub fn new(
        sender_reference: Option<&AccountReference>,
        receiver_reference: Option<&AccountReference>,
        sender_wallet: &WalletAddress,
        receiver_wallet: &WalletAddress,
        amount: Amount,
    ) -> Self {
        Self::new_at(
            sender_reference,
            receiver_reference,
            sender_wallet,
            receiver_wallet,
            amount,
            Utc::now(),
        )
    }

    /// Assemble memo content with an explicit timestamp.
    pub fn new_at(
        sender_reference: Option<&AccountReference>,
        receiver_reference: Option<&AccountReference>,
        sender_wallet: &WalletAddress,
        receiver_wallet: &WalletAddress,
        amount: Amount,
        at: DateTime<Utc>,
    ) -> Self {
        let reference = |r: Option<&AccountReference>| r.map(|r| r.as_str().to_string()).unwrap_or_default();
        Self {
            sender_reference: reference(sender_reference),
            receiver_reference: reference(receiver_reference),
            sender_wallet: sender_wallet.as_str().to_string(),
            receiver_wallet: receiver_wallet.as_str().to_string(),
            amount,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// A serialized memo ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo(CanonicalJson);

impl Memo {
    /// Serialize memo content. Does not check the size bound.
    pub fn build(content: &TransferMemo) -> Result<Self, MemoError> {
        Ok(Self(CanonicalJson::new(content)?))
    }

    /// Check the byte bound.
    pub fn validate_length(&self) -> Result<(), MemoError> {
        let len = self.0.byte_len();
        if len > MAX_MEMO_BYTES {
            return Err(MemoError::TooLong {
                len,
                max: MAX_MEMO_BYTES,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn byte_len(&self) -> usize {
        self.0.byte_len()
    }
}

impl Serialize for Memo {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
