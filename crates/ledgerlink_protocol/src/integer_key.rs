//! The IntegerKey family: named non-negative counters.
//!
//! Each update is `{Verb, Name, Value}`:
//! - `set` creates a counter that does not exist yet
//! - `inc` adds to an existing counter
//! - `dec` subtracts from an existing counter without going below zero

use crate::error::{ProtocolError, ProtocolResult};
use crate::family::TransactionFamily;
use crate::transaction::Transaction;
use ledgerlink_codec::Value;
use ledgerlink_store::Store;

/// Type name of IntegerKey transactions.
pub const TYPE_NAME: &str = "/IntegerKeyTransaction";
/// Message type of IntegerKey envelopes.
pub const MESSAGE_TYPE: &str = "/IntegerKey/Transaction";

/// Largest value a counter may hold.
pub const MAX_VALUE: i64 = u32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Set,
    Inc,
    Dec,
}

impl Verb {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "set" => Some(Verb::Set),
            "inc" => Some(Verb::Inc),
            "dec" => Some(Verb::Dec),
            _ => None,
        }
    }
}

/// Builds a `set` update.
pub fn set(name: impl Into<String>, value: i64) -> Value {
    update("set", name, value)
}

/// Builds an `inc` update.
pub fn inc(name: impl Into<String>, value: i64) -> Value {
    update("inc", name, value)
}

/// Builds a `dec` update.
pub fn dec(name: impl Into<String>, value: i64) -> Value {
    update("dec", name, value)
}

fn update(verb: &str, name: impl Into<String>, value: i64) -> Value {
    Value::map([
        ("Verb", Value::from(verb)),
        ("Name", Value::Text(name.into())),
        ("Value", Value::Integer(value)),
    ])
}

/// IntegerKey transaction family.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerKey;

impl IntegerKey {
    /// Validates one update against `store` and applies it there.
    fn step(store: &mut Store, update: &Value) -> ProtocolResult<()> {
        let verb = update
            .get("Verb")
            .and_then(Value::as_text)
            .ok_or_else(|| ProtocolError::invalid("update has no Verb"))?;
        let verb = Verb::parse(verb)
            .ok_or_else(|| ProtocolError::invalid(format!("unknown verb {verb}")))?;
        let name = update
            .get("Name")
            .and_then(Value::as_text)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProtocolError::invalid("update has no Name"))?;
        let amount = update
            .get("Value")
            .and_then(Value::as_integer)
            .filter(|v| (0..=MAX_VALUE).contains(v))
            .ok_or_else(|| ProtocolError::invalid(format!("value for {name} out of range")))?;

        let current = store.get(name).and_then(Value::as_integer);
        let next = match (verb, current) {
            (Verb::Set, None) => amount,
            (Verb::Set, Some(_)) => {
                return Err(ProtocolError::invalid(format!("{name} already exists")))
            }
            (_, None) => return Err(ProtocolError::invalid(format!("{name} does not exist"))),
            (Verb::Inc, Some(v)) => v
                .checked_add(amount)
                .filter(|n| *n <= MAX_VALUE)
                .ok_or_else(|| ProtocolError::invalid(format!("{name} would overflow")))?,
            (Verb::Dec, Some(v)) => v
                .checked_sub(amount)
                .filter(|n| *n >= 0)
                .ok_or_else(|| ProtocolError::invalid(format!("{name} would go negative")))?,
        };
        store.set(name, Value::Integer(next));
        Ok(())
    }
}

impl TransactionFamily for IntegerKey {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn message_type(&self) -> &str {
        MESSAGE_TYPE
    }

    fn check_valid(&self, store: &Store, transaction: &Transaction) -> ProtocolResult<()> {
        if transaction.type_name() != TYPE_NAME {
            return Err(ProtocolError::invalid(format!(
                "expected {TYPE_NAME}, got {}",
                transaction.type_name()
            )));
        }
        // Later updates in the same transaction see earlier ones.
        let mut scratch = store.fork();
        for update in transaction.updates() {
            Self::step(&mut scratch, update)?;
        }
        Ok(())
    }

    fn apply(&self, store: &mut Store, transaction: &Transaction) -> ProtocolResult<()> {
        let mut next = store.fork();
        for update in transaction.updates() {
            Self::step(&mut next, update)?;
        }
        *store = next;
        Ok(())
    }
}
