//! # Ledgerlink Client
//!
//! Client library for a remote ledger validator.
//!
//! This crate provides:
//! - A blocking transport channel with a session cookie and typed
//!   response classification
//! - State synchronization: a copy-on-write snapshot of one store kept in
//!   step with the validator's blocks, plus a speculative fork for
//!   not-yet-committed transactions
//! - A submission pipeline that signs, checks locally and posts
//!   transactions
//! - Batches that group several updates into one transaction
//! - Commit confirmation polling
//!
//! ## Architecture
//!
//! The validator is authoritative. The client only observes its totally
//! ordered block sequence:
//! 1. Refresh: list the newest block ids; apply deltas for the blocks
//!    since the recorded head, oldest first, or refetch the whole store
//!    when the recorded head is outside the lookback window
//! 2. Fork the synchronized snapshot into the speculative store
//! 3. Submit: every accepted transaction is applied to the speculative
//!    store, so dependent transactions validate before the first commits
//! 4. The next refresh discards the speculative store and forks again
//!
//! ## Key Invariants
//!
//! - The synchronized snapshot is replaced, never mutated in place
//! - Speculative writes never reach the synchronized snapshot
//! - At most one batch is open per client
//! - Transaction ids are fixed at signing time
//! - The session cookie is set once and never overwritten

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod batch;
mod client;
mod commit;
mod config;
mod error;
mod http;
pub mod paths;
mod pipeline;
#[cfg(feature = "reqwest")]
mod reqwest_client;
mod status;
mod sync;

pub use batch::{BatchSlot, PendingBatch};
pub use client::{BatchScope, LedgerClient};
pub use commit::{CommitOutcome, CommitPoller};
pub use config::{ClientConfig, KeySource, WaitConfig, DEFAULT_LOOKBACK, DEFAULT_NAME};
pub use error::{ClientError, ClientResult};
pub use http::{
    Channel, Headers, HttpClient, HttpError, HttpResponse, LoopbackClient, LoopbackServer, Method,
    INVALID_TRANSACTION_ERROR,
};
pub use pipeline::{MessageSink, SharedSigner, SubmissionPipeline};
#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;
pub use status::TransactionStatus;
pub use sync::{LedgerSource, RefreshOutcome, StateSync};

/// HTTP ledger client.
#[cfg(feature = "reqwest")]
pub type HttpLedgerClient = LedgerClient<ReqwestClient>;
