//! Error types for the ledger client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to a validator.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The client is missing setup required by the operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or transport error, including non-2xx responses without a
    /// recognized error payload.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The validator answered with something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request exceeded its timeout.
    #[error("operation timed out")]
    Timeout,

    /// The transaction was rejected, either by the validator or by the
    /// local speculative check.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ledgerlink_codec::CodecError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] ledgerlink_store::StoreError),

    /// Signing or envelope error.
    #[error("signing error: {0}")]
    Signing(String),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Timeout => true,
            _ => false,
        }
    }

    /// Returns true for the generic transport/protocol failure kind.
    ///
    /// The submission pipeline turns these into a `None` result instead of
    /// propagating them.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. }
                | ClientError::Protocol(_)
                | ClientError::Timeout
                | ClientError::Codec(_)
                | ClientError::Store(_)
        )
    }
}

impl From<ledgerlink_protocol::ProtocolError> for ClientError {
    fn from(err: ledgerlink_protocol::ProtocolError) -> Self {
        use ledgerlink_protocol::ProtocolError;
        match err {
            ProtocolError::InvalidTransaction(reason) => ClientError::InvalidTransaction(reason),
            ProtocolError::KeyLoad(reason) => {
                ClientError::Configuration(format!("failed to load key: {reason}"))
            }
            ProtocolError::Codec(e) => ClientError::Codec(e),
            ProtocolError::Signature(reason) => ClientError::Signing(reason),
        }
    }
}
