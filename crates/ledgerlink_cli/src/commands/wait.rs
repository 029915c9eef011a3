//! Commit confirmation command.

use super::CommandResult;
use ledgerlink_client::{ClientConfig, CommitOutcome, LedgerClient};
use ledgerlink_protocol::TransactionId;
use std::time::Duration;

/// Waits for a transaction to commit.
pub fn run(config: ClientConfig, id: &str, interval: f64, polls: u32) -> CommandResult {
    if !interval.is_finite() || interval < 0.0 {
        return Err(format!("invalid interval {interval}").into());
    }
    let client = LedgerClient::connect(config)?;
    let id = TransactionId::from(id);
    let outcome = client.wait_for_commit_outcome(Some(&id), Duration::from_secs_f64(interval), polls)?;
    report(&id, outcome)
}

/// Prints how a wait ended; anything but a commit is an error.
pub fn report(id: &TransactionId, outcome: CommitOutcome) -> CommandResult {
    match outcome {
        CommitOutcome::NoTarget => Ok(()),
        CommitOutcome::Committed { checks } => {
            println!("{id} committed after {checks} check(s)");
            Ok(())
        }
        CommitOutcome::NotFound { checks } => {
            Err(format!("{id} unknown to the validator after {checks} check(s)").into())
        }
        CommitOutcome::PendingExhausted { checks } => {
            Err(format!("{id} still pending after {checks} check(s)").into())
        }
        CommitOutcome::UnknownStatus { status, checks } => {
            Err(format!("{id} returned status {status} after {checks} check(s)").into())
        }
    }
}
