//! State synchronization engine.
//!
//! Keeps a synchronized snapshot of one store consistent with the
//! validator's block chain and derives a speculative fork from it after
//! every refresh. Catch-up is incremental (per-block deltas, oldest first)
//! while the recorded head is within the lookback window, and a full
//! refetch otherwise.

use crate::error::{ClientError, ClientResult};
use crate::http::{Channel, HttpClient};
use crate::paths::{list_path, store_path, ItemKind, ALL_OBJECTS};
use ledgerlink_codec::{Body, Value};
use ledgerlink_store::{BlockId, Delta, Snapshot, Store};
use tracing::debug;

/// Read access to the ledger that the engine needs.
pub trait LedgerSource {
    /// Returns up to `count` most recent block ids, newest first.
    fn block_list(&self, count: usize) -> ClientResult<Vec<BlockId>>;

    /// Returns the effect of one block on `store`.
    fn store_delta(&self, store: &str, block_id: &BlockId) -> ClientResult<Delta>;

    /// Returns every object of `store` as of `block_id`.
    fn store_objects(&self, store: &str, block_id: &BlockId) -> ClientResult<Store>;
}

/// Requires a structured body.
pub(crate) fn structured(body: Body, what: &str) -> ClientResult<Value> {
    body.into_value()
        .ok_or_else(|| ClientError::Protocol(format!("expected a structured {what} response")))
}

/// Parses a list of text ids.
pub(crate) fn text_list(value: &Value, what: &str) -> ClientResult<Vec<String>> {
    value
        .as_array()
        .ok_or_else(|| ClientError::Protocol(format!("{what} is not a list")))?
        .iter()
        .map(|item| {
            item.as_text()
                .map(str::to_string)
                .ok_or_else(|| ClientError::Protocol(format!("{what} holds a non-text entry")))
        })
        .collect()
}

impl<C: HttpClient> LedgerSource for Channel<C> {
    fn block_list(&self, count: usize) -> ClientResult<Vec<BlockId>> {
        let value = structured(self.get(&list_path(ItemKind::Block, Some(count)))?, "block list")?;
        Ok(text_list(&value, "block list")?
            .into_iter()
            .map(BlockId::from)
            .collect())
    }

    fn store_delta(&self, store: &str, block_id: &BlockId) -> ClientResult<Delta> {
        let path = store_path(Some(store), Some(ALL_OBJECTS), Some(block_id.as_str()), true);
        let value = structured(self.get(&path)?, "store delta")?;
        Ok(Delta::from_payload(&value)?)
    }

    fn store_objects(&self, store: &str, block_id: &BlockId) -> ClientResult<Store> {
        let path = store_path(Some(store), Some(ALL_OBJECTS), Some(block_id.as_str()), false);
        let value = structured(self.get(&path)?, "store")?;
        Ok(Store::from_payload(&value)?)
    }
}

/// What a refresh had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The recorded head is still the validator's head.
    Current,
    /// Deltas were applied for this many new blocks.
    Incremental {
        /// Number of deltas applied.
        applied: usize,
    },
    /// The store was refetched in full.
    Full,
}

/// Synchronized and speculative state for one store.
#[derive(Debug, Clone)]
pub struct StateSync {
    store_name: String,
    lookback: usize,
    synchronized: Snapshot,
    speculative: Store,
}

impl StateSync {
    /// Creates an engine with empty, never-synchronized state.
    pub fn new(store_name: impl Into<String>, lookback: usize) -> Self {
        Self {
            store_name: store_name.into(),
            lookback: lookback.max(1),
            synchronized: Snapshot::empty(),
            speculative: Store::new(),
        }
    }

    /// Name of the store being tracked.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// The block the synchronized snapshot is consistent through.
    pub fn head(&self) -> Option<&BlockId> {
        self.synchronized.block_id()
    }

    /// Returns true once a refresh has completed.
    pub fn is_synchronized(&self) -> bool {
        self.head().is_some()
    }

    /// The synchronized snapshot.
    pub fn synchronized(&self) -> &Snapshot {
        &self.synchronized
    }

    /// The speculative store.
    pub fn speculative(&self) -> &Store {
        &self.speculative
    }

    /// The speculative store, for applying submitted transactions.
    pub fn speculative_mut(&mut self) -> &mut Store {
        &mut self.speculative
    }

    /// Brings the synchronized snapshot up to the validator's head.
    ///
    /// Nothing is replaced unless every fetch succeeds.
    ///
    /// # Errors
    ///
    /// An empty block list is a protocol error: the validator always has at
    /// least a genesis block. Fetch failures propagate.
    pub fn refresh<S: LedgerSource + ?Sized>(&mut self, source: &S) -> ClientResult<RefreshOutcome> {
        let ids = source.block_list(self.lookback)?;
        let head = ids
            .first()
            .cloned()
            .ok_or_else(|| ClientError::Protocol("validator returned an empty block list".into()))?;

        if self.head() == Some(&head) {
            return Ok(RefreshOutcome::Current);
        }

        let common = self
            .head()
            .and_then(|recorded| ids.iter().position(|id| id == recorded));

        let (synchronized, outcome) = match common {
            Some(position) => {
                let mut snapshot = self.synchronized.clone();
                for block_id in ids[..position].iter().rev() {
                    debug!(store = %self.store_name, block = %block_id, "fetch delta for block");
                    let delta = source.store_delta(&self.store_name, block_id)?;
                    snapshot = snapshot.advance(&delta, block_id.clone());
                }
                (snapshot, RefreshOutcome::Incremental { applied: position })
            }
            None => {
                debug!(store = %self.store_name, block = %head, "full fetch of state for block");
                let store = source.store_objects(&self.store_name, &head)?;
                (Snapshot::new(store, head.clone()), RefreshOutcome::Full)
            }
        };

        self.synchronized = synchronized;
        self.speculative = self.synchronized.fork();
        debug!(store = %self.store_name, head = %head, ?outcome, "state refreshed");
        Ok(outcome)
    }
}
