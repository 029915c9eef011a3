//! Transaction status as reported by a HEAD request.

use std::fmt;

/// Status of a transaction, mapped from the HTTP status of a HEAD request
/// on its item path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// 200: the transaction is in a committed block.
    Committed,
    /// 302: the validator holds the transaction but has not committed it.
    Pending,
    /// 404: the validator does not know the transaction.
    NotFound,
    /// 500
    InternalServerError,
    /// 503
    ServerBusy,
    /// Any other status code.
    Unknown(u16),
}

impl TransactionStatus {
    /// Maps an HTTP status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => TransactionStatus::Committed,
            302 => TransactionStatus::Pending,
            404 => TransactionStatus::NotFound,
            500 => TransactionStatus::InternalServerError,
            503 => TransactionStatus::ServerBusy,
            other => TransactionStatus::Unknown(other),
        }
    }

    /// The HTTP status code this status was mapped from.
    pub fn code(self) -> u16 {
        match self {
            TransactionStatus::Committed => 200,
            TransactionStatus::Pending => 302,
            TransactionStatus::NotFound => 404,
            TransactionStatus::InternalServerError => 500,
            TransactionStatus::ServerBusy => 503,
            TransactionStatus::Unknown(code) => code,
        }
    }

    /// Returns true for [`TransactionStatus::Committed`].
    pub fn is_committed(self) -> bool {
        self == TransactionStatus::Committed
    }
}

impl From<u16> for TransactionStatus {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Committed => f.write_str("committed"),
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::NotFound => f.write_str("not_found"),
            TransactionStatus::InternalServerError => f.write_str("internal_server_error"),
            TransactionStatus::ServerBusy => f.write_str("server_busy"),
            TransactionStatus::Unknown(code) => write!(f, "unknown:{code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping() {
        assert_eq!(TransactionStatus::from_code(200), TransactionStatus::Committed);
        assert_eq!(TransactionStatus::from_code(302), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::from_code(404), TransactionStatus::NotFound);
        assert_eq!(TransactionStatus::from_code(500), TransactionStatus::InternalServerError);
        assert_eq!(TransactionStatus::from_code(503), TransactionStatus::ServerBusy);
        assert_eq!(TransactionStatus::from_code(418), TransactionStatus::Unknown(418));
    }

    #[test]
    fn codes_survive_mapping() {
        for code in [200, 302, 404, 500, 503, 201, 418] {
            assert_eq!(TransactionStatus::from(code).code(), code);
        }
    }

    #[test]
    fn display_labels() {
        assert_eq!(TransactionStatus::NotFound.to_string(), "not_found");
        assert_eq!(TransactionStatus::Unknown(418).to_string(), "unknown:418");
        assert!(TransactionStatus::Committed.is_committed());
        assert!(!TransactionStatus::Pending.is_committed());
    }
}
