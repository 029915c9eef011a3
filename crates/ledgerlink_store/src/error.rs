//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while building stores from remote payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A full object listing had the wrong shape.
    #[error("invalid object listing: {0}")]
    InvalidObjects(String),

    /// A block delta had the wrong shape.
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ledgerlink_codec::CodecError),
}
