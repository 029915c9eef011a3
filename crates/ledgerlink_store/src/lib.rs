//! # Ledgerlink Store
//!
//! Copy-on-write key/value stores mirrored from a remote ledger.
//!
//! This crate provides:
//! - [`Store`], a persistent map with O(1) forks and O(changed keys)
//!   delta application
//! - [`Delta`], the sparse effect of one block on a store
//! - [`Snapshot`], a store paired with the block it is consistent through
//! - [`BlockId`]
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delta;
mod error;
mod store;
mod types;

pub use delta::{Delta, DELETED_KEYS_FIELD, STORE_FIELD};
pub use error::{StoreError, StoreResult};
pub use store::{Snapshot, Store};
pub use types::BlockId;
