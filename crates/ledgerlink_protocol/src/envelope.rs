//! Signed message envelopes carrying transactions to the validator.

use crate::error::{ProtocolError, ProtocolResult};
use crate::signer::{identifier_for, verify_signature, Signer};
use crate::transaction::Transaction;
use ledgerlink_codec::{to_cbor, CodecError, CodecResult, Decode, Encode, Value};

mod field {
    pub const TYPE: &str = "__TYPE__";
    pub const NONCE: &str = "__NONCE__";
    pub const SIGNATURE: &str = "__SIGNATURE__";
    pub const SENDER: &str = "SenderID";
    pub const TRANSACTION: &str = "Transaction";
}

/// A transaction wrapped with its sender's identity and an envelope-level
/// signature.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    message_type: String,
    nonce: i64,
    sender_id: String,
    transaction: Transaction,
    signature: Option<String>,
}

impl MessageEnvelope {
    /// Wraps and signs a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has not been signed yet.
    pub fn seal<S: Signer + ?Sized>(
        message_type: impl Into<String>,
        transaction: Transaction,
        signer: &S,
    ) -> ProtocolResult<Self> {
        if !transaction.is_signed() {
            return Err(ProtocolError::Signature(
                "transaction must be signed before it is wrapped".into(),
            ));
        }
        let mut envelope = Self {
            message_type: message_type.into(),
            nonce: rand::random::<i64>().wrapping_abs(),
            sender_id: signer.identifier(),
            transaction,
            signature: None,
        };
        let payload = to_cbor(&envelope.signing_payload())?;
        envelope.signature = Some(signer.sign(&payload));
        Ok(envelope)
    }

    /// The message type, which is also the endpoint the envelope is
    /// posted to.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Identifier of the sender.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// The wrapped transaction.
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Consumes the envelope, returning the transaction.
    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }

    /// Endpoint path for posting this envelope.
    pub fn endpoint(&self) -> &str {
        self.message_type.trim_start_matches('/')
    }

    fn signing_payload(&self) -> Value {
        Value::map([
            (field::TYPE, Value::from(self.message_type.as_str())),
            (field::NONCE, Value::Integer(self.nonce)),
            (field::SENDER, Value::from(self.sender_id.as_str())),
            (field::TRANSACTION, self.transaction.to_value()),
        ])
    }

    /// Verifies the envelope signature, the sender id, and the wrapped
    /// transaction's own signature.
    pub fn verify(&self) -> ProtocolResult<()> {
        let public_key = self
            .transaction
            .public_key()
            .ok_or_else(|| ProtocolError::Signature("transaction carries no public key".into()))?;
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| ProtocolError::Signature("envelope is not signed".into()))?;

        if identifier_for(public_key)? != self.sender_id {
            return Err(ProtocolError::Signature(
                "sender id does not match the signing key".into(),
            ));
        }
        let payload = to_cbor(&self.signing_payload())?;
        verify_signature(public_key, &payload, signature)?;
        self.transaction.verify()
    }
}

impl Encode for MessageEnvelope {
    fn to_value(&self) -> Value {
        let mut value = self.signing_payload();
        if let (Value::Map(map), Some(signature)) = (&mut value, &self.signature) {
            map.insert(field::SIGNATURE.to_string(), Value::from(signature.as_str()));
        }
        value
    }
}

impl Decode for MessageEnvelope {
    fn from_value(value: &Value) -> CodecResult<Self> {
        let text = |name: &str| -> CodecResult<String> {
            value
                .get(name)
                .and_then(Value::as_text)
                .map(str::to_string)
                .ok_or_else(|| CodecError::invalid_structure(format!("missing {name}")))
        };
        let transaction = value
            .get(field::TRANSACTION)
            .ok_or_else(|| CodecError::invalid_structure("missing Transaction"))
            .and_then(Transaction::from_value)?;

        Ok(Self {
            message_type: text(field::TYPE)?,
            nonce: value
                .get(field::NONCE)
                .and_then(Value::as_integer)
                .unwrap_or(0),
            sender_id: text(field::SENDER)?,
            transaction,
            signature: text(field::SIGNATURE).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::SigningIdentity;

    fn signed_transaction(identity: &SigningIdentity) -> Transaction {
        let mut txn = Transaction::new("/IntegerKeyTransaction", vec![Value::from(1)], vec![]);
        txn.sign(identity).unwrap();
        txn
    }

    #[test]
    fn seal_and_verify() {
        let identity = SigningIdentity::generate();
        let envelope =
            MessageEnvelope::seal("/IntegerKey/Transaction", signed_transaction(&identity), &identity)
                .unwrap();
        assert_eq!(envelope.endpoint(), "IntegerKey/Transaction");
        assert_eq!(envelope.sender_id(), identity.identifier());
        envelope.verify().unwrap();

        let decoded = MessageEnvelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
        decoded.verify().unwrap();
    }

    #[test]
    fn unsigned_transaction_cannot_be_sealed() {
        let identity = SigningIdentity::generate();
        let txn = Transaction::new("/X", vec![], vec![]);
        assert!(MessageEnvelope::seal("/X/Transaction", txn, &identity).is_err());
    }

    #[test]
    fn foreign_sender_is_rejected() {
        let alice = SigningIdentity::generate();
        let mallory = SigningIdentity::generate();
        // Mallory wraps a transaction Alice signed.
        let envelope =
            MessageEnvelope::seal("/X/Transaction", signed_transaction(&alice), &mallory).unwrap();
        assert!(matches!(envelope.verify(), Err(ProtocolError::Signature(_))));
    }
}
