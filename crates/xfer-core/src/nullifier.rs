//! # Nullifier Generation
//!
//! A nullifier is 32 bytes drawn from the operating system CSPRNG and
//! rendered as `0x` followed by 64 lowercase hex characters. Uniqueness is
//! enforced by the settlement contract rejecting a replayed value; nothing
//! here remembers previously issued nullifiers.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a nullifier in bytes.
pub const NULLIFIER_LEN: usize = 32;

/// Errors parsing a nullifier from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NullifierError {
    #[error("nullifier must start with 0x")]
    MissingPrefix,

    #[error("nullifier must be {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("nullifier contains non-hex characters")]
    InvalidHex,
}

/// A single-use settlement nullifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nullifier([u8; NULLIFIER_LEN]);

impl Nullifier {
    /// Draw a fresh nullifier from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NULLIFIER_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; NULLIFIER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NULLIFIER_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse the `0x`-prefixed hex form.
    pub fn parse(s: &str) -> Result<Self, NullifierError> {
        let digits = s.strip_prefix("0x").ok_or(NullifierError::MissingPrefix)?;
        if digits.len() != NULLIFIER_LEN * 2 {
            return Err(NullifierError::WrongLength {
                expected: NULLIFIER_LEN * 2,
                actual: digits.len(),
            });
        }
        let mut bytes = [0u8; NULLIFIER_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| NullifierError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({})", self.to_hex())
    }
}

impl FromStr for Nullifier {
    type Err = NullifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Nullifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Nullifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
