//! Transaction families: the rules that decide whether a transaction is
//! acceptable and how it changes the store.

use crate::error::{ProtocolError, ProtocolResult};
use crate::transaction::Transaction;
use ledgerlink_codec::Value;
use ledgerlink_store::Store;

/// Validation and application rules for one kind of transaction.
///
/// The same rules run on the validator and, speculatively, on the client
/// before a transaction is sent.
pub trait TransactionFamily: Send + Sync {
    /// Transaction type name, e.g. `/IntegerKeyTransaction`.
    fn type_name(&self) -> &str;

    /// Message type the envelope is posted as, e.g.
    /// `/IntegerKey/Transaction`.
    fn message_type(&self) -> &str;

    /// Name of the store this family writes to.
    fn store_name(&self) -> &str {
        self.type_name().trim_matches('/')
    }

    /// Checks whether `transaction` would be accepted against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransaction`] describing the first
    /// rule the transaction breaks.
    fn check_valid(&self, store: &Store, transaction: &Transaction) -> ProtocolResult<()>;

    /// Applies the transaction's updates to `store`.
    fn apply(&self, store: &mut Store, transaction: &Transaction) -> ProtocolResult<()>;
}

/// Field naming the object key in a generic record update.
pub const KEY_FIELD: &str = "Key";
/// Field carrying the new object in a generic record update.
pub const VALUE_FIELD: &str = "Value";
/// Field marking a generic record update as a removal.
pub const DELETED_FIELD: &str = "Deleted";

/// A family without domain rules: each update either writes
/// `{Key, Value}` or removes `{Key, Deleted: true}`.
#[derive(Debug, Clone)]
pub struct GenericRecordFamily {
    type_name: String,
    message_type: String,
}

impl GenericRecordFamily {
    /// Creates a generic family with the given names.
    pub fn new(type_name: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message_type: message_type.into(),
        }
    }

    /// Builds a write update.
    pub fn put(key: impl Into<String>, value: Value) -> Value {
        Value::map([(KEY_FIELD, Value::Text(key.into())), (VALUE_FIELD, value)])
    }

    /// Builds a removal update.
    pub fn delete(key: impl Into<String>) -> Value {
        Value::map([
            (KEY_FIELD, Value::Text(key.into())),
            (DELETED_FIELD, Value::Bool(true)),
        ])
    }
}

enum RecordOp<'a> {
    Put(&'a str, &'a Value),
    Delete(&'a str),
}

fn parse_record(update: &Value) -> ProtocolResult<RecordOp<'_>> {
    let key = update
        .get(KEY_FIELD)
        .and_then(Value::as_text)
        .ok_or_else(|| ProtocolError::invalid("update has no text Key"))?;
    if update.get(DELETED_FIELD).and_then(Value::as_bool) == Some(true) {
        return Ok(RecordOp::Delete(key));
    }
    let value = update
        .get(VALUE_FIELD)
        .ok_or_else(|| ProtocolError::invalid(format!("update for {key} has no Value")))?;
    Ok(RecordOp::Put(key, value))
}

impl TransactionFamily for GenericRecordFamily {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn message_type(&self) -> &str {
        &self.message_type
    }

    fn check_valid(&self, _store: &Store, transaction: &Transaction) -> ProtocolResult<()> {
        for update in transaction.updates() {
            parse_record(update)?;
        }
        Ok(())
    }

    fn apply(&self, store: &mut Store, transaction: &Transaction) -> ProtocolResult<()> {
        for update in transaction.updates() {
            match parse_record(update)? {
                RecordOp::Put(key, value) => {
                    store.set(key, value.clone());
                }
                RecordOp::Delete(key) => {
                    store.delete(key);
                }
            }
        }
        Ok(())
    }
}
