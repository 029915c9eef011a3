//! CBOR and JSON decoders, and content-type dispatch for response bodies.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::fmt;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, contain non-text map
/// keys, or integers outside the i64 range.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Decode a value from JSON bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON.
pub fn from_json(bytes: &[u8]) -> CodecResult<Value> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Declared encoding of an HTTP body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/cbor`
    Cbor,
    /// Anything else, kept verbatim (empty when no header was sent).
    Other(String),
}

impl ContentType {
    /// Parses a `Content-Type` header value.
    ///
    /// Media type parameters such as `charset` are ignored.
    pub fn parse(header: Option<&str>) -> Self {
        let Some(raw) = header else {
            return ContentType::Other(String::new());
        };
        let media = raw.split(';').next().unwrap_or("").trim();
        if media.eq_ignore_ascii_case("application/json") {
            ContentType::Json
        } else if media.eq_ignore_ascii_case("application/cbor") {
            ContentType::Cbor
        } else {
            ContentType::Other(raw.to_string())
        }
    }

    /// Returns the header value for this content type.
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Cbor => "application/cbor",
            ContentType::Other(s) => s,
        }
    }

    /// Returns true for the two structured encodings.
    pub fn is_structured(&self) -> bool {
        matches!(self, ContentType::Json | ContentType::Cbor)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded HTTP body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Body was JSON or CBOR and decoded into a value.
    Structured(Value),
    /// Body had another content type and is passed through untouched.
    Opaque(Vec<u8>),
}

impl Body {
    /// Returns the structured value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Body::Structured(v) => Some(v),
            Body::Opaque(_) => None,
        }
    }
}

/// Decodes a body according to its declared content type.
///
/// # Errors
///
/// Returns an error if a JSON or CBOR body is malformed.
pub fn decode_body(content_type: &ContentType, bytes: &[u8]) -> CodecResult<Body> {
    match content_type {
        ContentType::Json => from_json(bytes).map(Body::Structured),
        ContentType::Cbor => from_cbor(bytes).map(Body::Structured),
        ContentType::Other(_) => Ok(Body::Opaque(bytes.to_vec())),
    }
}

/// Encodes a value in the given structured content type.
///
/// # Errors
///
/// Returns an error for non-structured content types.
pub fn encode_body(content_type: &ContentType, value: &Value) -> CodecResult<Vec<u8>> {
    match content_type {
        ContentType::Json => crate::encoder::to_json(value),
        ContentType::Cbor => crate::encoder::to_cbor(value),
        ContentType::Other(other) => Err(CodecError::encoding_failed(format!(
            "cannot encode a structured value as '{other}'"
        ))),
    }
}
