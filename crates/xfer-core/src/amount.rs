//! # Amount — Fixed-Point Ledger Money
//!
//! Balances and transfer amounts are stored as `i64` minor units with two
//! fractional digits. The type cannot hold a negative value: every
//! constructor rejects one and [`Amount::checked_sub`] returns `None`
//! instead of crossing zero. This makes the ledger invariant
//! `balance >= 0` a property of the type rather than of each call site.
//!
//! Amounts serialize as decimal strings (`"800.00"`). Canonical JSON in the
//! stack never carries floats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits carried by an [`Amount`].
pub const SCALE: u32 = 2;

const MINOR_PER_MAJOR: i64 = 100;

/// Largest minor-unit value that can be derived from an `f64` without
/// losing integer precision (2^53 - 1).
const MAX_FLOAT_MINOR: f64 = 9_007_199_254_740_991.0;

/// Errors constructing an [`Amount`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    /// NaN or infinity.
    #[error("amount must be a finite number, got {0}")]
    NotFinite(f64),

    /// Negative input.
    #[error("amount must not be negative, got {0}")]
    Negative(String),

    /// More fractional digits than the ledger carries.
    #[error("amount has more than 2 fractional digits: {0}")]
    ExcessPrecision(String),

    /// Too large to represent exactly.
    #[error("amount out of range: {0}")]
    OutOfRange(String),

    /// Not a decimal number.
    #[error("invalid amount syntax: {0:?}")]
    Syntax(String),
}

/// A non-negative fixed-point amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units (cents).
    pub fn from_minor(minor: i64) -> Result<Self, AmountError> {
        if minor < 0 {
            return Err(AmountError::Negative(minor.to_string()));
        }
        Ok(Self(minor))
    }

    /// Construct from a whole number of major units.
    pub fn from_major(major: i64) -> Result<Self, AmountError> {
        let minor = major
            .checked_mul(MINOR_PER_MAJOR)
            .ok_or_else(|| AmountError::OutOfRange(major.to_string()))?;
        Self::from_minor(minor)
    }

    /// Convert a JSON-style floating point number of major units.
    ///
    /// Rejects non-finite values, negatives, values with sub-cent precision
    /// and values too large to convert without rounding.
    pub fn from_major_f64(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NotFinite(value));
        }
        if value < 0.0 {
            return Err(AmountError::Negative(value.to_string()));
        }
        let scaled = value * MINOR_PER_MAJOR as f64;
        let rounded = scaled.round();
        if rounded > MAX_FLOAT_MINOR {
            return Err(AmountError::OutOfRange(value.to_string()));
        }
        if (scaled - rounded).abs() > 1e-6 {
            return Err(AmountError::ExcessPrecision(value.to_string()));
        }
        Ok(Self(rounded as i64))
    }

    /// Minor units (cents).
    pub fn minor_units(self) -> i64 {
        self.0
    }

    /// Whether this amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add two amounts, `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtract, `None` if the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Some(Amount(v)),
            _ => None,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_MAJOR,
            self.0 % MINOR_PER_MAJOR
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(AmountError::Negative(s.to_string()));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Syntax(s.to_string()));
        }
        if frac.len() > SCALE as usize {
            return Err(AmountError::ExcessPrecision(s.to_string()));
        }
        let whole: i64 = whole
            .parse()
            .map_err(|_| AmountError::OutOfRange(s.to_string()))?;
        let mut cents: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse()
                .map_err(|_| AmountError::Syntax(s.to_string()))?
        };
        if frac.len() == 1 {
            cents *= 10;
        }
        whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|w| w.checked_add(cents))
            .map(Amount)
            .ok_or_else(|| AmountError::OutOfRange(s.to_string()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Integer(i) => Amount::from_major(i).map_err(serde::de::Error::custom),
            Repr::Float(f) => Amount::from_major_f64(f).map_err(serde::de::Error::custom),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Display and parse agree for every non-negative amount.
        #[test]
        fn display_parses_back(minor in 0i64..=i64::MAX) {
            let a = Amount::from_minor(minor).unwrap();
            prop_assert_eq!(a.to_string().parse::<Amount>().unwrap(), a);
        }

        /// Subtraction either stays non-negative or refuses.
        #[test]
        fn checked_sub_is_never_negative(a in 0i64..1_000_000_000, b in 0i64..1_000_000_000) {
            let x = Amount::from_minor(a).unwrap();
            let y = Amount::from_minor(b).unwrap();
            match x.checked_sub(y) {
                Some(d) => prop_assert_eq!(d.minor_units(), a - b),
                None => prop_assert!(a < b),
            }
        }

        /// Cent-precise floats convert exactly.
        #[test]
        fn whole_cent_floats_convert(minor in 0i64..1_000_000_000) {
            let value = minor as f64 / 100.0;
            prop_assert_eq!(Amount::from_major_f64(value).unwrap().minor_units(), minor);
        }
    }
}
