//! Per-block store deltas.

use crate::error::{StoreError, StoreResult};
use ledgerlink_codec::{CodecError, CodecResult, Decode, Encode, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Field carrying updated objects in a delta payload.
pub const STORE_FIELD: &str = "Store";
/// Field carrying deleted keys in a delta payload.
pub const DELETED_KEYS_FIELD: &str = "DeletedKeys";

/// The effect of a single block on a store.
///
/// A delta only names keys the block touched: objects that were written
/// and keys that were removed. Applying it is proportional to its size,
/// not to the size of the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delta {
    /// Objects written by the block.
    pub updated: BTreeMap<String, Value>,
    /// Keys removed by the block.
    pub deleted: BTreeSet<String>,
}

impl Delta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.deleted.remove(&key);
        self.updated.insert(key, value);
    }

    /// Records a removal.
    pub fn delete(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.updated.remove(&key);
        self.deleted.insert(key);
    }

    /// Returns true if the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Number of keys touched.
    pub fn len(&self) -> usize {
        self.updated.len() + self.deleted.len()
    }

    /// Parses a delta from the validator's `{Store, DeletedKeys}` payload.
    ///
    /// Missing fields are treated as empty.
    pub fn from_payload(value: &Value) -> StoreResult<Self> {
        Self::from_value(value).map_err(|e| StoreError::InvalidDelta(e.to_string()))
    }
}

impl Encode for Delta {
    fn to_value(&self) -> Value {
        Value::map([
            (STORE_FIELD, Value::Map(self.updated.clone())),
            (
                DELETED_KEYS_FIELD,
                Value::Array(self.deleted.iter().cloned().map(Value::Text).collect()),
            ),
        ])
    }
}

impl Decode for Delta {
    fn from_value(value: &Value) -> CodecResult<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| CodecError::invalid_structure(format!("expected map, got {}", value.kind())))?;

        let updated = match map.get(STORE_FIELD) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Map(objects)) => objects.clone(),
            Some(other) => {
                return Err(CodecError::invalid_structure(format!(
                    "{STORE_FIELD} must be a map, got {}",
                    other.kind()
                )))
            }
        };

        let mut deleted = BTreeSet::new();
        match map.get(DELETED_KEYS_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::Array(keys)) => {
                for key in keys {
                    let key = key.as_text().ok_or_else(|| {
                        CodecError::invalid_structure(format!("{DELETED_KEYS_FIELD} must hold text"))
                    })?;
                    deleted.insert(key.to_string());
                }
            }
            Some(other) => {
                return Err(CodecError::invalid_structure(format!(
                    "{DELETED_KEYS_FIELD} must be an array, got {}",
                    other.kind()
                )))
            }
        }

        Ok(Self { updated, deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_delete_keeps_last_action() {
        let mut delta = Delta::new();
        delta.set("a", Value::from(1));
        delta.delete("a");
        assert!(delta.updated.is_empty());
        assert!(delta.deleted.contains("a"));

        delta.set("a", Value::from(2));
        assert!(delta.deleted.is_empty());
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn parses_validator_payload() {
        let payload = Value::map([
            (STORE_FIELD, Value::map([("k1", Value::from(1))])),
            (DELETED_KEYS_FIELD, Value::Array(vec![Value::from("k2")])),
        ]);
        let delta = Delta::from_payload(&payload).unwrap();
        assert_eq!(delta.updated.get("k1"), Some(&Value::Integer(1)));
        assert!(delta.deleted.contains("k2"));
        assert_eq!(Delta::from_value(&delta.to_value()).unwrap(), delta);
    }

    #[test]
    fn missing_fields_are_empty() {
        let delta = Delta::from_payload(&Value::empty_map()).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            Delta::from_payload(&Value::from("nope")),
            Err(StoreError::InvalidDelta(_))
        ));
        let bad_keys = Value::map([(DELETED_KEYS_FIELD, Value::Array(vec![Value::from(3)]))]);
        assert!(Delta::from_payload(&bad_keys).is_err());
        let bad_store = Value::map([(STORE_FIELD, Value::from(3))]);
        assert!(Delta::from_payload(&bad_store).is_err());
    }
}
