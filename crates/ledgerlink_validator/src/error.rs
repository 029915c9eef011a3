//! Error types for the reference validator.

use ledgerlink_codec::CodecError;
use ledgerlink_protocol::ProtocolError;
use thiserror::Error;

/// Result type for validator operations.
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Errors that can occur while serving a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidatorError {
    /// Malformed path, query or body.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown store, key, block or transaction.
    #[error("not found: {0}")]
    NotFound(String),

    /// No transaction family is registered for the message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The transaction breaks its family's rules.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Method not supported on this route.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Internal validator error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ValidatorError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ValidatorError::InvalidRequest(_)
            | ValidatorError::InvalidTransaction(_)
            | ValidatorError::Codec(_) => 400,
            ValidatorError::NotFound(_) | ValidatorError::UnknownMessageType(_) => 404,
            ValidatorError::MethodNotAllowed(_) => 405,
            ValidatorError::Internal(_) => 500,
        }
    }

    /// Error type tag carried in the response body.
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidatorError::InvalidRequest(_) | ValidatorError::Codec(_) => "InvalidRequestError",
            ValidatorError::NotFound(_) => "NotFoundError",
            ValidatorError::UnknownMessageType(_) => "UnknownMessageTypeError",
            ValidatorError::InvalidTransaction(_) => "InvalidTransactionError",
            ValidatorError::MethodNotAllowed(_) => "MethodNotAllowedError",
            ValidatorError::Internal(_) => "InternalError",
        }
    }

    /// Human-readable detail, without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            ValidatorError::InvalidRequest(s)
            | ValidatorError::NotFound(s)
            | ValidatorError::UnknownMessageType(s)
            | ValidatorError::InvalidTransaction(s)
            | ValidatorError::MethodNotAllowed(s)
            | ValidatorError::Internal(s) => s.clone(),
            ValidatorError::Codec(e) => e.to_string(),
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<ProtocolError> for ValidatorError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidTransaction(reason) => ValidatorError::InvalidTransaction(reason),
            ProtocolError::Signature(reason) => {
                ValidatorError::InvalidRequest(format!("bad signature: {reason}"))
            }
            ProtocolError::Codec(e) => ValidatorError::Codec(e),
            ProtocolError::KeyLoad(reason) => ValidatorError::Internal(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert_eq!(ValidatorError::InvalidTransaction("x".into()).status_code(), 400);
        assert_eq!(ValidatorError::NotFound("block".into()).status_code(), 404);
        assert!(ValidatorError::InvalidRequest("bad".into()).is_client_error());
        assert!(!ValidatorError::Internal("oops".into()).is_client_error());
    }

    #[test]
    fn protocol_rejection_keeps_its_reason() {
        let err = ValidatorError::from(ProtocolError::invalid("a already exists"));
        assert_eq!(err.error_type(), "InvalidTransactionError");
        assert_eq!(err.detail(), "a already exists");
    }

    #[test]
    fn bad_signature_is_a_request_error() {
        let err = ValidatorError::from(ProtocolError::Signature("mismatch".into()));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_type(), "InvalidRequestError");
    }
}
