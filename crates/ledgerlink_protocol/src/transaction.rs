//! Transactions and update records.

use crate::error::{ProtocolError, ProtocolResult};
use crate::signer::{short_digest, verify_signature, Signer};
use ledgerlink_codec::{to_cbor, CodecError, CodecResult, Decode, Encode, Value};
use std::fmt;

/// Identifier of a signed transaction.
///
/// Derived from the transaction's signature at signing time and never
/// reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps an identifier received from elsewhere (e.g. the validator).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One update record or a sequence of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Updates {
    /// A single update record.
    One(Value),
    /// Several update records, in order.
    Many(Vec<Value>),
}

impl Updates {
    /// Returns the records in order.
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Updates::One(update) => vec![update],
            Updates::Many(updates) => updates,
        }
    }
}

impl From<Value> for Updates {
    fn from(update: Value) -> Self {
        Updates::One(update)
    }
}

impl From<Vec<Value>> for Updates {
    fn from(updates: Vec<Value>) -> Self {
        Updates::Many(updates)
    }
}

/// Field names of the transaction record.
mod field {
    pub const TYPE: &str = "TransactionType";
    pub const UPDATES: &str = "Updates";
    pub const DEPENDENCIES: &str = "Dependencies";
    pub const NONCE: &str = "Nonce";
    pub const PUBLIC_KEY: &str = "PublicKey";
    pub const SIGNATURE: &str = "Signature";
}

/// A transaction: an ordered group of updates for one transaction family,
/// plus the ids of transactions it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    type_name: String,
    updates: Vec<Value>,
    dependencies: Vec<TransactionId>,
    nonce: i64,
    public_key: Option<String>,
    signature: Option<String>,
    id: Option<TransactionId>,
}

impl Transaction {
    /// Creates an unsigned transaction with a fresh random nonce.
    pub fn new(
        type_name: impl Into<String>,
        updates: Vec<Value>,
        dependencies: Vec<TransactionId>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            updates,
            dependencies,
            nonce: rand::random::<i64>().wrapping_abs(),
            public_key: None,
            signature: None,
            id: None,
        }
    }

    /// The family type name this transaction belongs to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Update records, in submission order.
    pub fn updates(&self) -> &[Value] {
        &self.updates
    }

    /// Ids of transactions that must commit first.
    pub fn dependencies(&self) -> &[TransactionId] {
        &self.dependencies
    }

    /// Hex-encoded public key of the signer, once signed.
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// The transaction id, once signed.
    pub fn id(&self) -> Option<&TransactionId> {
        self.id.as_ref()
    }

    /// Returns true once the transaction carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The record the signature covers: everything but the signature.
    pub fn signing_payload(&self) -> Value {
        let mut map = std::collections::BTreeMap::new();
        map.insert(field::TYPE.to_string(), Value::from(self.type_name.as_str()));
        map.insert(field::UPDATES.to_string(), Value::Array(self.updates.clone()));
        map.insert(
            field::DEPENDENCIES.to_string(),
            Value::Array(
                self.dependencies
                    .iter()
                    .map(|d| Value::from(d.as_str()))
                    .collect(),
            ),
        );
        map.insert(field::NONCE.to_string(), Value::Integer(self.nonce));
        if let Some(ref key) = self.public_key {
            map.insert(field::PUBLIC_KEY.to_string(), Value::from(key.as_str()));
        }
        Value::Map(map)
    }

    /// Signs the transaction and fixes its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already signed; signatures
    /// and ids are never reassigned.
    pub fn sign<S: Signer + ?Sized>(&mut self, signer: &S) -> ProtocolResult<TransactionId> {
        if self.is_signed() {
            return Err(ProtocolError::Signature("transaction is already signed".into()));
        }
        self.public_key = Some(signer.public_key());
        let payload = to_cbor(&self.signing_payload())?;
        let signature = signer.sign(&payload);
        let id = TransactionId(short_digest(signature.as_bytes()));
        self.signature = Some(signature);
        self.id = Some(id.clone());
        Ok(id)
    }

    /// Checks the signature against the embedded public key and that the id
    /// was derived from it.
    pub fn verify(&self) -> ProtocolResult<()> {
        let (Some(key), Some(signature), Some(id)) = (&self.public_key, &self.signature, &self.id)
        else {
            return Err(ProtocolError::Signature("transaction is not signed".into()));
        };
        let payload = to_cbor(&self.signing_payload())?;
        verify_signature(key, &payload, signature)?;
        if short_digest(signature.as_bytes()) != id.as_str() {
            return Err(ProtocolError::Signature("transaction id does not match signature".into()));
        }
        Ok(())
    }
}

impl Encode for Transaction {
    fn to_value(&self) -> Value {
        let mut value = self.signing_payload();
        if let (Value::Map(map), Some(signature)) = (&mut value, &self.signature) {
            map.insert(field::SIGNATURE.to_string(), Value::from(signature.as_str()));
        }
        value
    }
}

impl Decode for Transaction {
    fn from_value(value: &Value) -> CodecResult<Self> {
        let text = |name: &str| -> CodecResult<String> {
            value
                .get(name)
                .and_then(Value::as_text)
                .map(str::to_string)
                .ok_or_else(|| CodecError::invalid_structure(format!("missing {name}")))
        };

        let type_name = text(field::TYPE)?;
        let updates = value
            .get(field::UPDATES)
            .and_then(Value::as_array)
            .map(<[Value]>::to_vec)
            .ok_or_else(|| CodecError::invalid_structure("missing Updates"))?;
        let dependencies = value
            .get(field::DEPENDENCIES)
            .and_then(Value::as_array)
            .unwrap_or(&[])
            .iter()
            .map(|d| {
                d.as_text()
                    .map(TransactionId::from)
                    .ok_or_else(|| CodecError::invalid_structure("dependency ids must be text"))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        let nonce = value
            .get(field::NONCE)
            .and_then(Value::as_integer)
            .unwrap_or(0);
        let public_key = text(field::PUBLIC_KEY).ok();
        let signature = text(field::SIGNATURE).ok();
        let id = signature
            .as_ref()
            .map(|s| TransactionId(short_digest(s.as_bytes())));

        Ok(Self {
            type_name,
            updates,
            dependencies,
            nonce,
            public_key,
            signature,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::SigningIdentity;

    fn sample() -> Transaction {
        Transaction::new(
            "/IntegerKeyTransaction",
            vec![Value::map([("Verb", "set"), ("Name", "a")])],
            vec![TransactionId::from("0011223344556677")],
        )
    }

    #[test]
    fn signing_fixes_the_id() {
        let identity = SigningIdentity::generate();
        let mut txn = sample();
        assert!(txn.id().is_none());

        let id = txn.sign(&identity).unwrap();
        assert_eq!(txn.id(), Some(&id));
        assert_eq!(id.as_str().len(), 16);
        txn.verify().unwrap();

        assert!(txn.sign(&identity).is_err());
        assert_eq!(txn.id(), Some(&id));
    }

    #[test]
    fn distinct_transactions_get_distinct_ids() {
        let identity = SigningIdentity::generate();
        let mut a = sample();
        let mut b = sample();
        assert_ne!(a.sign(&identity).unwrap(), b.sign(&identity).unwrap());
    }

    #[test]
    fn tampering_breaks_verification() {
        let identity = SigningIdentity::generate();
        let mut txn = sample();
        txn.sign(&identity).unwrap();

        let mut value = txn.to_value();
        if let Value::Map(map) = &mut value {
            map.insert("Updates".into(), Value::Array(vec![]));
        }
        let tampered = Transaction::from_value(&value).unwrap();
        assert!(matches!(tampered.verify(), Err(ProtocolError::Signature(_))));
    }

    #[test]
    fn decoded_transaction_keeps_id() {
        let identity = SigningIdentity::generate();
        let mut txn = sample();
        let id = txn.sign(&identity).unwrap();

        let decoded = Transaction::decode(&txn.encode().unwrap()).unwrap();
        assert_eq!(decoded.id(), Some(&id));
        assert_eq!(decoded.dependencies(), txn.dependencies());
        decoded.verify().unwrap();
    }

    #[test]
    fn unsigned_transaction_does_not_verify() {
        assert!(sample().verify().is_err());
    }

    #[test]
    fn updates_conversion() {
        let one: Updates = Value::from(1).into();
        assert_eq!(one.into_vec().len(), 1);
        let many: Updates = vec![Value::from(1), Value::from(2)].into();
        assert_eq!(many.into_vec().len(), 2);
    }
}
