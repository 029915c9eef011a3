//! Block chain and pending queue.

use crate::error::{ValidatorError, ValidatorResult};
use ledgerlink_codec::{Encode, Value};
use ledgerlink_protocol::{short_digest, Transaction, TransactionFamily, TransactionId};
use ledgerlink_store::{BlockId, Delta, Store};
use std::collections::{BTreeMap, HashMap};

/// A committed block.
///
/// Each block keeps a full snapshot of every store. Snapshots share
/// structure with their predecessor, so this costs little more than the
/// delta itself.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    number: u64,
    previous: Option<BlockId>,
    transaction_ids: Vec<TransactionId>,
    stores: BTreeMap<String, Store>,
    deltas: BTreeMap<String, Delta>,
}

impl Block {
    /// Block id.
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Height of the block; genesis is 0.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Ids of the transactions committed in this block.
    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }

    /// Snapshot of `store` as of this block.
    pub fn store(&self, name: &str) -> Option<&Store> {
        self.stores.get(name)
    }

    /// Effect of this block on `store`. Empty if the block did not touch it.
    pub fn delta(&self, name: &str) -> Delta {
        self.deltas.get(name).cloned().unwrap_or_default()
    }

    /// Fields served by the block routes.
    pub fn to_value(&self) -> Value {
        Value::map([
            ("BlockID", Value::from(self.id.as_str())),
            ("BlockNum", Value::Integer(self.number as i64)),
            (
                "PreviousBlockID",
                self.previous
                    .as_ref()
                    .map(|id| Value::from(id.as_str()))
                    .unwrap_or(Value::Null),
            ),
            (
                "TransactionIDs",
                Value::Array(
                    self.transaction_ids
                        .iter()
                        .map(|id| Value::from(id.as_str()))
                        .collect(),
                ),
            ),
        ])
    }
}

/// Where a transaction stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionState {
    /// Committed in the given block.
    Committed(BlockId),
    /// Accepted and queued for the next block.
    Pending,
    /// Never seen.
    Unknown,
}

/// The validator's ledger: committed blocks plus the transactions queued
/// for the next one.
///
/// Queued transactions are applied to a pending copy of every store as
/// they arrive, so each new transaction is validated against the effects
/// of everything accepted before it.
#[derive(Debug)]
pub struct Ledger {
    blocks: Vec<Block>,
    block_index: HashMap<BlockId, usize>,
    transactions: HashMap<TransactionId, (Transaction, Option<BlockId>)>,
    pending: Vec<TransactionId>,
    pending_stores: BTreeMap<String, Store>,
}

impl Ledger {
    /// Creates a ledger holding only the genesis block.
    pub fn new() -> Self {
        let genesis = Block {
            id: BlockId::from(short_digest(b"genesis")),
            number: 0,
            previous: None,
            transaction_ids: Vec::new(),
            stores: BTreeMap::new(),
            deltas: BTreeMap::new(),
        };
        let mut block_index = HashMap::new();
        block_index.insert(genesis.id.clone(), 0);
        Self {
            blocks: vec![genesis],
            block_index,
            transactions: HashMap::new(),
            pending: Vec::new(),
            pending_stores: BTreeMap::new(),
        }
    }

    /// Makes `name` a known store, empty until written.
    pub fn register_store(&mut self, name: &str) {
        self.pending_stores.entry(name.to_string()).or_default();
    }

    /// Names of all known stores.
    pub fn store_names(&self) -> Vec<String> {
        self.pending_stores.keys().cloned().collect()
    }

    /// Returns true if `name` is a known store.
    pub fn has_store(&self, name: &str) -> bool {
        self.pending_stores.contains_key(name)
    }

    /// The newest block.
    pub fn head(&self) -> &Block {
        // The genesis block is never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of blocks, genesis included.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Looks up a block.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.block_index.get(id).and_then(|&i| self.blocks.get(i))
    }

    /// The `count` newest blocks, newest first. `None` means all.
    pub fn recent_blocks(&self, count: Option<usize>) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .rev()
            .take(count.unwrap_or(usize::MAX))
    }

    /// Snapshot of `store` as of `block`. Stores registered after the block
    /// was produced are empty there.
    pub fn store_at(&self, name: &str, block: &Block) -> ValidatorResult<Store> {
        if !self.has_store(name) {
            return Err(ValidatorError::NotFound(format!("store {name}")));
        }
        Ok(block.store(name).cloned().unwrap_or_default())
    }

    /// Number of queued transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Looks up a transaction and the block it was committed in.
    pub fn transaction(&self, id: &TransactionId) -> Option<(&Transaction, Option<&BlockId>)> {
        self.transactions
            .get(id)
            .map(|(transaction, block)| (transaction, block.as_ref()))
    }

    /// Where `id` stands.
    pub fn transaction_state(&self, id: &TransactionId) -> TransactionState {
        match self.transactions.get(id) {
            Some((_, Some(block))) => TransactionState::Committed(block.clone()),
            Some((_, None)) => TransactionState::Pending,
            None => TransactionState::Unknown,
        }
    }

    /// Validates a signed transaction against the pending stores and
    /// queues it.
    ///
    /// # Errors
    ///
    /// Duplicates, unknown dependencies and rule violations are rejected
    /// as invalid transactions; the pending stores are left untouched.
    pub fn submit(
        &mut self,
        family: &dyn TransactionFamily,
        transaction: Transaction,
    ) -> ValidatorResult<TransactionId> {
        let id = transaction
            .id()
            .cloned()
            .ok_or_else(|| ValidatorError::InvalidRequest("transaction is not signed".into()))?;
        if self.transactions.contains_key(&id) {
            return Err(ValidatorError::InvalidTransaction(format!(
                "duplicate transaction {id}"
            )));
        }
        if let Some(missing) = transaction
            .dependencies()
            .iter()
            .find(|dependency| !self.transactions.contains_key(*dependency))
        {
            return Err(ValidatorError::InvalidTransaction(format!(
                "unknown dependency {missing}"
            )));
        }

        let store_name = family.store_name().to_string();
        let mut store = self
            .pending_stores
            .get(&store_name)
            .cloned()
            .unwrap_or_default();
        family.check_valid(&store, &transaction)?;
        family.apply(&mut store, &transaction)?;

        self.pending_stores.insert(store_name, store);
        self.pending.push(id.clone());
        self.transactions.insert(id.clone(), (transaction, None));
        Ok(id)
    }

    /// Commits every queued transaction into a new block and returns it.
    ///
    /// A block is produced even with an empty queue.
    pub fn commit_pending(&mut self) -> &Block {
        let transaction_ids = std::mem::take(&mut self.pending);
        let previous = self.head();
        let number = previous.number + 1;
        let previous_id = previous.id.clone();

        let mut seed = format!("{previous_id}:{number}");
        for id in &transaction_ids {
            seed.push(':');
            seed.push_str(id.as_str());
        }
        let id = BlockId::from(short_digest(seed.as_bytes()));

        let empty = Store::new();
        let deltas: BTreeMap<String, Delta> = self
            .pending_stores
            .iter()
            .filter_map(|(name, store)| {
                let base = previous.stores.get(name).unwrap_or(&empty);
                let delta = store.delta_from(base);
                (!delta.is_empty()).then(|| (name.clone(), delta))
            })
            .collect();

        for transaction_id in &transaction_ids {
            if let Some(entry) = self.transactions.get_mut(transaction_id) {
                entry.1 = Some(id.clone());
            }
        }

        let block = Block {
            id: id.clone(),
            number,
            previous: Some(previous_id),
            transaction_ids,
            stores: self.pending_stores.clone(),
            deltas,
        };
        self.block_index.insert(id, self.blocks.len());
        self.blocks.push(block);
        self.head()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction as served by the transaction routes: its own fields plus
/// `Status` and, once committed, `InBlock`.
pub fn transaction_value(transaction: &Transaction, block: Option<&BlockId>) -> Value {
    let mut value = transaction.to_value();
    if let Value::Map(map) = &mut value {
        if let Some(id) = transaction.id() {
            map.insert("Identifier".to_string(), Value::from(id.as_str()));
        }
        let status = if block.is_some() { "committed" } else { "pending" };
        map.insert("Status".to_string(), Value::from(status));
        map.insert(
            "InBlock".to_string(),
            block.map(|id| Value::from(id.as_str())).unwrap_or(Value::Null),
        );
    }
    value
}
