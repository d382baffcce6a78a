//! # Canonical Serialization — JCS Text for Transfer Memos
//!
//! `CanonicalJson` is the only way to produce the text attached to a chain
//! settlement. Its inner field is private, so the single constructor
//! [`CanonicalJson::new`] always applies float rejection before RFC 8785
//! serialization (sorted keys, compact separators).
//!
//! Floats are rejected because two implementations can disagree on their
//! shortest round-trip representation. Amounts travel as decimal strings.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors producing canonical JSON.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// A non-integer number was found in the value tree.
    #[error("float values are not permitted in canonical JSON: {0}")]
    FloatRejected(f64),

    /// `serde_json` or `serde_jcs` failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// UTF-8 text produced by JCS canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalJson(String);

impl CanonicalJson {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let text = serde_jcs::to_string(&value)?;
        Ok(Self(text))
    }

    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in UTF-8 bytes.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    /// Consume into the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CanonicalJson {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted_and_compact() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hello"});
        let c = CanonicalJson::new(&data).unwrap();
        assert_eq!(c.as_str(), r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let data = serde_json::json!({"outer": {"z": 1, "a": 2}, "list": [3, 2, 1]});
        let c = CanonicalJson::new(&data).unwrap();
        assert_eq!(c.as_str(), r#"{"list":[3,2,1],"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn floats_are_rejected_at_any_depth() {
        let data = serde_json::json!({"outer": [{"amount": 1.5}]});
        match CanonicalJson::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 1.5),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
    }

    #[test]
    fn byte_len_counts_utf8_bytes() {
        let data = serde_json::json!({"k": "é"});
        let c = CanonicalJson::new(&data).unwrap();
        assert_eq!(c.as_str().chars().count(), 10);
        assert_eq!(c.byte_len(), 11);
    }
}
