//! Batch accumulator: groups several updates into one transaction.

use crate::error::{ClientError, ClientResult};
use ledgerlink_codec::Value;
use ledgerlink_protocol::{TransactionId, Updates};

/// Updates and dependencies accumulated for one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBatch {
    updates: Vec<Value>,
    dependencies: Vec<TransactionId>,
}

impl PendingBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends updates in order and merges in the dependencies.
    pub fn add(&mut self, updates: impl Into<Updates>, dependencies: &[TransactionId]) {
        self.updates.extend(updates.into().into_vec());
        for dependency in dependencies {
            if !self.dependencies.contains(dependency) {
                self.dependencies.push(dependency.clone());
            }
        }
    }

    /// Accumulated updates, in the order they were added.
    pub fn updates(&self) -> &[Value] {
        &self.updates
    }

    /// Union of all dependencies, in first-seen order.
    pub fn dependencies(&self) -> &[TransactionId] {
        &self.dependencies
    }

    /// Returns true if no updates were added.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Splits the batch into updates and dependencies.
    pub fn into_parts(self) -> (Vec<Value>, Vec<TransactionId>) {
        (self.updates, self.dependencies)
    }
}

/// Single slot holding at most one open batch.
#[derive(Debug, Default)]
pub struct BatchSlot {
    open: Option<PendingBatch>,
}

impl BatchSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a batch.
    ///
    /// # Errors
    ///
    /// Batches do not nest: fails if one is already open.
    pub fn start(&mut self) -> ClientResult<()> {
        if self.open.is_some() {
            return Err(ClientError::configuration("update batch already in progress"));
        }
        self.open = Some(PendingBatch::new());
        Ok(())
    }

    /// Returns true while a batch is open.
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// The open batch, if any.
    pub fn pending(&self) -> Option<&PendingBatch> {
        self.open.as_ref()
    }

    /// Adds to the open batch.
    ///
    /// Returns the updates back when no batch is open, so the caller can
    /// submit them directly.
    pub fn add(&mut self, updates: Updates, dependencies: &[TransactionId]) -> Option<Updates> {
        match self.open.as_mut() {
            Some(batch) => {
                batch.add(updates, dependencies);
                None
            }
            None => Some(updates),
        }
    }

    /// Closes the batch and hands back its contents.
    ///
    /// The slot is empty afterwards whatever the outcome.
    ///
    /// # Errors
    ///
    /// Fails if no batch is open or the batch holds no updates.
    pub fn take(&mut self) -> ClientResult<PendingBatch> {
        let batch = self
            .open
            .take()
            .ok_or_else(|| ClientError::configuration("no update batch in progress"))?;
        if batch.is_empty() {
            return Err(ClientError::configuration("no updates in batch"));
        }
        Ok(batch)
    }

    /// Discards the open batch, if any.
    pub fn reset(&mut self) {
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TransactionId {
        TransactionId::from(s)
    }

    #[test]
    fn batches_do_not_nest() {
        let mut slot = BatchSlot::new();
        slot.start().unwrap();
        assert!(matches!(slot.start(), Err(ClientError::Configuration(_))));
        assert!(slot.is_open());
    }

    #[test]
    fn add_accumulates_in_order_with_dependency_union() {
        let mut slot = BatchSlot::new();
        slot.start().unwrap();
        assert!(slot.add(Value::from(1).into(), &[id("a")]).is_none());
        assert!(slot
            .add(vec![Value::from(2), Value::from(3)].into(), &[id("b"), id("a")])
            .is_none());

        let batch = slot.take().unwrap();
        assert_eq!(batch.updates(), &[Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(batch.dependencies(), &[id("a"), id("b")]);
        assert!(!slot.is_open());
    }

    #[test]
    fn add_without_batch_hands_updates_back() {
        let mut slot = BatchSlot::new();
        let back = slot.add(Value::from(1).into(), &[]);
        assert_eq!(back, Some(Updates::One(Value::from(1))));
    }

    #[test]
    fn empty_batch_cannot_be_sent() {
        let mut slot = BatchSlot::new();
        assert!(slot.take().is_err());

        slot.start().unwrap();
        let err = slot.take().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: no updates in batch");
        assert!(!slot.is_open());
    }

    #[test]
    fn reset_discards_everything() {
        let mut slot = BatchSlot::new();
        slot.start().unwrap();
        slot.add(Value::from(1).into(), &[id("a")]);
        slot.reset();
        assert!(!slot.is_open());
        assert!(slot.pending().is_none());
        slot.start().unwrap();
        assert_eq!(slot.pending(), Some(&PendingBatch::new()));
    }
}
