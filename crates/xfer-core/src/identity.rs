//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers a transfer touches. These prevent
//! accidental identifier confusion: an `OrganizationId` cannot be passed
//! where an `AccountId` is expected, and a receiver reference cannot be
//! mistaken for a wallet address.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors constructing identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Database identifiers start at 1.
    #[error("{kind} id must be a positive integer, got {value}")]
    NonPositiveId {
        /// Which identifier namespace.
        kind: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// Empty or whitespace-only account reference.
    #[error("account reference must be a non-empty string")]
    EmptyReference,

    /// Not a `0x`-prefixed 20-byte hex address.
    #[error("invalid wallet address: {0:?}")]
    InvalidWallet(String),
}

/// Ledger account (user) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    /// Construct a validated account id.
    pub fn new(id: i64) -> Result<Self, IdentityError> {
        if id <= 0 {
            return Err(IdentityError::NonPositiveId {
                kind: "account",
                value: id,
            });
        }
        Ok(Self(id))
    }

    /// The raw database id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organization identifier. Two accounts are same-organization exactly
/// when their `OrganizationId`s are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(i64);

impl OrganizationId {
    /// Construct a validated organization id.
    pub fn new(id: i64) -> Result<Self, IdentityError> {
        if id <= 0 {
            return Err(IdentityError::NonPositiveId {
                kind: "organization",
                value: id,
            });
        }
        Ok(Self(id))
    }

    /// The raw database id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// EVM-style wallet address, normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalize a `0x`-prefixed, 40-hex-character address.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| IdentityError::InvalidWallet(s.to_string()))?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdentityError::InvalidWallet(s.to_string()));
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    /// The normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        WalletAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Number of random bytes in a generated reference suffix.
const REFERENCE_SUFFIX_BYTES: usize = 8;

/// Opaque account reference: `"{organization_wallet}-{suffix}"`.
///
/// Clients address receivers by reference rather than by account id.
/// Lookups are exact-match, so the stored string is never trimmed or
/// case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountReference(String);

impl AccountReference {
    /// Wrap an existing reference string.
    pub fn new(s: impl Into<String>) -> Result<Self, IdentityError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(IdentityError::EmptyReference);
        }
        Ok(Self(s))
    }

    /// Mint a fresh reference for an account owned by `wallet`.
    pub fn generate(wallet: &WalletAddress) -> Self {
        let mut suffix = [0u8; REFERENCE_SUFFIX_BYTES];
        rand::thread_rng().fill_bytes(&mut suffix);
        Self(format!("{}-{}", wallet.as_str(), hex::encode(suffix)))
    }

    /// The owning organization's wallet embedded in the reference, if the
    /// reference follows the generated format.
    pub fn organization_wallet(&self) -> Option<WalletAddress> {
        let (wallet, _suffix) = self.0.rsplit_once('-')?;
        WalletAddress::parse(wallet).ok()
    }

    /// The reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AccountReference::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

    #[test]
    fn account_id_rejects_zero_and_negative() {
        assert!(AccountId::new(0).is_err());
        assert!(AccountId::new(-7).is_err());
        assert_eq!(AccountId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn organization_id_rejects_zero() {
        let err = OrganizationId::new(0).unwrap_err();
        assert!(err.to_string().contains("organization"));
    }

    #[test]
    fn wallet_is_normalized_to_lowercase() {
        let w = WalletAddress::parse(WALLET).unwrap();
        assert_eq!(w.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn wallet_rejects_bad_shapes() {
        assert!(WalletAddress::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(WalletAddress::parse("0x1234").is_err());
        assert!(WalletAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn reference_rejects_blank() {
        assert_eq!(
            AccountReference::new("   ").unwrap_err(),
            IdentityError::EmptyReference
        );
    }

    #[test]
    fn generated_reference_embeds_wallet() {
        let w = WalletAddress::parse(WALLET).unwrap();
        let a = AccountReference::generate(&w);
        let b = AccountReference::generate(&w);
        assert_ne!(a, b);
        assert_eq!(a.organization_wallet(), Some(w));
        assert_eq!(a.as_str().len(), 42 + 1 + REFERENCE_SUFFIX_BYTES * 2);
    }

    #[test]
    fn free_form_reference_has_no_wallet() {
        let r = AccountReference::new("legacy-user-17").unwrap();
        assert_eq!(r.organization_wallet(), None);
    }

    #[test]
    fn reference_deserialize_validates() {
        assert!(serde_json::from_str::<AccountReference>("\"\"").is_err());
        let r: AccountReference = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(r.as_str(), "abc");
    }
}
