//! CBOR and JSON encoders.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to canonical CBOR bytes.
///
/// Map entries are written in canonical key order (shorter keys first,
/// then bytewise), so identical values always produce identical bytes.
/// Signatures are computed over this encoding.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Encode a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn to_json(value: &Value) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
}
