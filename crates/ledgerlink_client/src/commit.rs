//! Commit confirmation: polls a transaction's status until it commits or
//! the poll budget runs out.

use crate::error::ClientResult;
use crate::status::TransactionStatus;
use ledgerlink_protocol::TransactionId;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a wait for commit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No transaction was given and none was ever submitted.
    NoTarget,
    /// The transaction was observed committed.
    Committed {
        /// Status checks issued.
        checks: u32,
    },
    /// The budget ran out while the validator did not know the transaction.
    NotFound {
        /// Status checks issued.
        checks: u32,
    },
    /// The budget ran out while the transaction was still pending.
    PendingExhausted {
        /// Status checks issued.
        checks: u32,
    },
    /// The budget ran out on some other status.
    UnknownStatus {
        /// Last status observed.
        status: TransactionStatus,
        /// Status checks issued.
        checks: u32,
    },
}

impl CommitOutcome {
    /// Returns true when there is nothing left to wait for.
    pub fn is_success(&self) -> bool {
        matches!(self, CommitOutcome::NoTarget | CommitOutcome::Committed { .. })
    }

    /// Number of status checks issued.
    pub fn checks(&self) -> u32 {
        match *self {
            CommitOutcome::NoTarget => 0,
            CommitOutcome::Committed { checks }
            | CommitOutcome::NotFound { checks }
            | CommitOutcome::PendingExhausted { checks }
            | CommitOutcome::UnknownStatus { checks, .. } => checks,
        }
    }
}

/// Bounded status poller.
///
/// The first check is followed by up to `max_polls` retries, so a poller
/// issues at most `max_polls + 1` checks.
#[derive(Debug, Clone, Copy)]
pub struct CommitPoller {
    poll_interval: Duration,
    max_polls: u32,
}

impl CommitPoller {
    /// Creates a poller.
    pub fn new(poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            poll_interval,
            max_polls,
        }
    }

    /// Polls `check` until `transaction_id` is committed or the budget is
    /// spent, sleeping between checks.
    ///
    /// # Errors
    ///
    /// Only a failing status check is an error. Running out of polls is an
    /// outcome.
    pub fn wait<F>(&self, transaction_id: Option<&TransactionId>, mut check: F) -> ClientResult<CommitOutcome>
    where
        F: FnMut(&TransactionId) -> ClientResult<TransactionStatus>,
    {
        let Some(transaction_id) = transaction_id else {
            info!("no transaction specified for wait");
            return Ok(CommitOutcome::NoTarget);
        };

        let started = Instant::now();
        let mut checks = 0u32;
        loop {
            checks += 1;
            let status = check(transaction_id)?;
            if status.is_committed() {
                debug!(transaction = %transaction_id, checks, "transaction committed");
                return Ok(CommitOutcome::Committed { checks });
            }

            if checks > self.max_polls {
                let outcome = match status {
                    TransactionStatus::NotFound => {
                        warn!(transaction = %transaction_id, "unknown transaction");
                        CommitOutcome::NotFound { checks }
                    }
                    TransactionStatus::Pending => {
                        warn!(
                            transaction = %transaction_id,
                            elapsed_secs = started.elapsed().as_secs(),
                            "transaction still uncommitted"
                        );
                        CommitOutcome::PendingExhausted { checks }
                    }
                    other => {
                        warn!(
                            transaction = %transaction_id,
                            status = other.code(),
                            "transaction returned unexpected status code"
                        );
                        CommitOutcome::UnknownStatus { status: other, checks }
                    }
                };
                return Ok(outcome);
            }

            debug!(transaction = %transaction_id, %status, "waiting for transaction to commit");
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    fn poller(max_polls: u32) -> CommitPoller {
        CommitPoller::new(Duration::ZERO, max_polls)
    }

    #[test]
    fn no_target_is_trivial_success() {
        let mut calls = 0;
        let outcome = poller(3)
            .wait(None, |_| {
                calls += 1;
                Ok(TransactionStatus::Pending)
            })
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NoTarget);
        assert!(outcome.is_success());
        assert_eq!(calls, 0);
    }

    #[test]
    fn always_pending_makes_max_polls_plus_one_checks() {
        let id = TransactionId::from("tx1");
        let mut calls = 0;
        let outcome = poller(3)
            .wait(Some(&id), |_| {
                calls += 1;
                Ok(TransactionStatus::Pending)
            })
            .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(outcome, CommitOutcome::PendingExhausted { checks: 4 });
        assert!(!outcome.is_success());
    }

    #[test]
    fn committed_returns_immediately() {
        let id = TransactionId::from("tx1");
        let mut statuses = vec![TransactionStatus::Committed, TransactionStatus::Pending];
        let outcome = poller(12).wait(Some(&id), |_| Ok(statuses.pop().unwrap())).unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { checks: 2 });
        assert!(statuses.is_empty());
    }

    #[test]
    fn exhaustion_detail_follows_last_status() {
        let id = TransactionId::from("tx1");
        let outcome = poller(0)
            .wait(Some(&id), |_| Ok(TransactionStatus::NotFound))
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NotFound { checks: 1 });

        let outcome = poller(1)
            .wait(Some(&id), |_| Ok(TransactionStatus::Unknown(418)))
            .unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::UnknownStatus {
                status: TransactionStatus::Unknown(418),
                checks: 2
            }
        );
        assert_eq!(outcome.checks(), 2);
    }

    #[test]
    fn failing_check_propagates() {
        let id = TransactionId::from("tx1");
        let result = poller(3).wait(Some(&id), |_| Err(ClientError::Timeout));
        assert!(matches!(result, Err(ClientError::Timeout)));
    }
}
