//! # Ledgerlink Protocol
//!
//! Transaction, envelope and signing types for Ledgerlink.
//!
//! This crate provides:
//! - [`Transaction`] and [`TransactionId`]
//! - [`MessageEnvelope`], the signed wrapper posted to the validator
//! - [`Signer`] and the ed25519 [`SigningIdentity`]
//! - [`TransactionFamily`], the validation/application rules shared by the
//!   validator and the client's speculative check
//! - Two families: [`GenericRecordFamily`] and [`IntegerKey`]
//!
//! This is a pure protocol crate with no network I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod family;
pub mod integer_key;
mod signer;
mod transaction;

pub use envelope::MessageEnvelope;
pub use error::{ProtocolError, ProtocolResult};
pub use family::{GenericRecordFamily, TransactionFamily, DELETED_FIELD, KEY_FIELD, VALUE_FIELD};
pub use integer_key::IntegerKey;
pub use signer::{
    identifier_for, short_digest, verify_signature, Signer, SigningIdentity, SECRET_KEY_SIZE,
};
pub use transaction::{Transaction, TransactionId, Updates};
