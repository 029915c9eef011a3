//! Error types for protocol operations.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building, signing or checking transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ledgerlink_codec::CodecError),

    /// A signing key could not be loaded or parsed.
    #[error("failed to load key: {0}")]
    KeyLoad(String),

    /// A signature is missing, malformed or does not verify.
    #[error("signature error: {0}")]
    Signature(String),

    /// The transaction would be rejected by its family's rules.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
}

impl ProtocolError {
    /// Creates an invalid transaction error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidTransaction(reason.into())
    }
}
