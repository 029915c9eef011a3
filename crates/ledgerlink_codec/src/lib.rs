//! # Ledgerlink Codec
//!
//! Structured record values and body codecs for Ledgerlink.
//!
//! The validator speaks two structured encodings, JSON and CBOR, and
//! declares which one it used through the `Content-Type` header. This
//! crate provides:
//! - [`Value`], the dynamic record type used for store objects, updates
//!   and response bodies
//! - Deterministic CBOR encoding (map keys in canonical order), suitable
//!   for signing
//! - Content-type dispatch for response bodies
//!
//! ## Usage
//!
//! ```
//! use ledgerlink_codec::{from_cbor, to_cbor, Value};
//!
//! let value = Value::map([("Name", Value::from("counter")), ("Value", Value::from(1))]);
//! let bytes = to_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode_body, encode_body, from_cbor, from_json, Body, ContentType};
pub use encoder::{to_cbor, to_json};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Trait for types that have a structured record representation.
pub trait Encode {
    /// Converts this value into a structured record.
    fn to_value(&self) -> Value;

    /// Encodes this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(&self.to_value())
    }
}

/// Trait for types that can be rebuilt from a structured record.
pub trait Decode: Sized {
    /// Rebuilds this value from a structured record.
    fn from_value(value: &Value) -> CodecResult<Self>;

    /// Decodes this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

impl Encode for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl Decode for Value {
    fn from_value(value: &Value) -> CodecResult<Self> {
        Ok(value.clone())
    }
}
