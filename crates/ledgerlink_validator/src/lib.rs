//! # Ledgerlink Validator
//!
//! In-memory reference validator for Ledgerlink clients.
//!
//! This crate provides:
//! - The read routes (`status`, `store`, `block`, `transaction`)
//! - Transaction status over HEAD (200 committed, 302 pending, 404 unknown)
//! - Envelope verification and family validation on POST
//! - Session cookies
//!
//! # Architecture
//!
//! The validator keeps:
//! - A chain of blocks, each with a full snapshot and a delta per store
//! - A queue of accepted transactions and the pending stores they produce
//! - The registered transaction families, keyed by message endpoint
//!
//! It never simulates consensus. Blocks are produced on explicit request
//! with [`LedgerValidator::produce_block`], which makes it suitable for
//! deterministic tests.
//!
//! # Transport
//!
//! Requests and responses are plain values ([`Request`], [`Response`]);
//! the embedding code decides how they travel.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod error;
mod handler;
mod ledger;
mod request;
mod server;

pub use config::{ResponseFormat, ValidatorConfig};
pub use error::{ValidatorError, ValidatorResult};
pub use handler::{HandlerContext, RequestHandler};
pub use ledger::{transaction_value, Block, Ledger, TransactionState};
pub use request::{Method, Request, Response};
pub use server::LedgerValidator;
