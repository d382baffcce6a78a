//! # Input Validation
//!
//! Converts a loosely-typed transfer request into a [`TransferRequest`]
//! whose fields are already the validated domain types. Validation is pure:
//! no I/O and no side effects, so a rejected request never reaches the
//! ledger or any external collaborator.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::amount::Amount;
use crate::error::TransferError;
use crate::identity::{AccountId, AccountReference};

/// The request as it arrives on the wire. Fields stay untyped so that a
/// wrong type is reported as `INVALID_INPUT` with the offending field
/// rather than as a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferRequestInput {
    pub sender_id: Value,
    pub receiver_reference: Value,
    pub amount: Value,
}

/// A validated transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_reference: AccountReference,
    pub amount: Amount,
}

/// Why a request was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct InvalidInput {
    /// The offending request field.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl InvalidInput {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl From<InvalidInput> for TransferError {
    fn from(err: InvalidInput) -> Self {
        TransferError::invalid_input(err.to_string()).with_details(json!({
            "field": err.field,
            "reason": err.reason,
        }))
    }
}

/// Validate a raw request.
///
/// Checks run in a fixed order (`receiver_reference`, `amount`,
/// `sender_id`) and the first violation is returned.
pub fn validate(input: &TransferRequestInput) -> Result<TransferRequest, InvalidInput> {
    let receiver_reference = validate_reference(&input.receiver_reference)?;
    let amount = validate_amount(&input.amount)?;
    let sender_id = validate_sender_id(&input.sender_id)?;
    Ok(TransferRequest {
        sender_id,
        receiver_reference,
        amount,
    })
}

fn validate_reference(value: &Value) -> Result<AccountReference, InvalidInput> {
    let s = value
        .as_str()
        .ok_or_else(|| InvalidInput::new("receiver_reference", "must be a non-empty string"))?;
    AccountReference::new(s).map_err(|e| InvalidInput::new("receiver_reference", e.to_string()))
}

fn validate_amount(value: &Value) -> Result<Amount, InvalidInput> {
    let n = value
        .as_f64()
        .ok_or_else(|| InvalidInput::new("amount", "must be a number"))?;
    if !n.is_finite() || n <= 0.0 {
        return Err(InvalidInput::new(
            "amount",
            format!("must be a finite number greater than zero, got {n}"),
        ));
    }
    let amount = Amount::from_major_f64(n).map_err(|e| InvalidInput::new("amount", e.to_string()))?;
    // Positive values below one cent round to zero.
    if amount.is_zero() {
        return Err(InvalidInput::new("amount", format!("must be at least 0.01, got {n}")));
    }
    Ok(amount)
}

fn validate_sender_id(value: &Value) -> Result<AccountId, InvalidInput> {
    let reject = || InvalidInput::new("sender_id", "must be a positive integer");
    let id = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64() {
                if f.fract() != 0.0 || !f.is_finite() || f.abs() > i64::MAX as f64 {
                    return Err(reject());
                }
                f as i64
            } else {
                return Err(reject());
            }
        }
        _ => return Err(reject()),
    };
    AccountId::new(id).map_err(|_| reject())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn input(sender_id: Value, receiver_reference: Value, amount: Value) -> TransferRequestInput {
        TransferRequestInput {
            sender_id,
            receiver_reference,
            amount,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        let req = validate(&input(json!(7), json!("ref-1"), json!(200.5))).unwrap();
        assert_eq!(req.sender_id.get(), 7);
        assert_eq!(req.receiver_reference.as_str(), "ref-1");
        assert_eq!(req.amount.minor_units(), 20_050);
    }

    #[test]
    fn rejects_empty_or_missing_reference() {
        let err = validate(&input(json!(1), json!(""), json!(1))).unwrap_err();
        assert_eq!(err.field, "receiver_reference");
        let err = validate(&input(json!(1), Value::Null, json!(1))).unwrap_err();
        assert_eq!(err.field, "receiver_reference");
        let err = validate(&input(json!(1), json!(42), json!(1))).unwrap_err();
        assert_eq!(err.field, "receiver_reference");
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for bad in [json!(0), json!(-5), json!(-0.01), json!("10"), Value::Null] {
            let err = validate(&input(json!(1), json!("r"), bad.clone())).unwrap_err();
            assert_eq!(err.field, "amount", "value {bad} should be rejected");
        }
    }

    #[test]
    fn rejects_sub_cent_amounts() {
        let err = validate(&input(json!(1), json!("r"), json!(0.001))).unwrap_err();
        assert_eq!(err.field, "amount");
        let err = validate(&input(json!(1), json!("r"), json!(10.123))).unwrap_err();
        assert_eq!(err.field, "amount");
    }

    #[test]
    fn rejects_fractional_or_non_numeric_sender() {
        for bad in [json!(1.5), json!(0), json!(-3), json!("5"), Value::Null] {
            let err = validate(&input(bad.clone(), json!("r"), json!(1))).unwrap_err();
            assert_eq!(err.field, "sender_id", "value {bad} should be rejected");
        }
    }

    #[test]
    fn whole_float_sender_is_accepted() {
        let req = validate(&input(json!(12.0), json!("r"), json!(1))).unwrap();
        assert_eq!(req.sender_id.get(), 12);
    }

    #[test]
    fn first_violation_wins() {
        let err = validate(&input(json!(-1), json!(""), json!(-1))).unwrap_err();
        assert_eq!(err.field, "receiver_reference");
    }

    #[test]
    fn converts_to_invalid_input_error() {
        let err: TransferError = validate(&input(json!(1), json!("r"), json!(0)))
            .unwrap_err()
            .into();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.details.unwrap()["field"], "amount");
    }
}
