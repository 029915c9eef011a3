//! Copy-on-write key/value store.

use crate::delta::Delta;
use crate::error::{StoreError, StoreResult};
use crate::types::BlockId;
use im::OrdMap;
use ledgerlink_codec::Value;

/// An immutable-by-default mapping from object key to object value.
///
/// The map is a persistent B-tree: [`Store::fork`] shares every node with
/// the original and costs O(1), and writes to either side copy only the
/// path to the touched key. A synchronized store and its speculative
/// fork therefore never observe each other's writes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Store {
    objects: OrdMap<String, Value>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a brand-new store from a full object listing, with no shared
    /// history with any prior store.
    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self {
            objects: objects.into_iter().collect(),
        }
    }

    /// Builds a store from a `key -> object` map returned by the validator.
    ///
    /// A null payload is an empty store.
    pub fn from_payload(value: &Value) -> StoreResult<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Map(objects) => Ok(Self::from_objects(
                objects.iter().map(|(k, v)| (k.clone(), v.clone())),
            )),
            other => Err(StoreError::InvalidObjects(format!(
                "expected map of objects, got {}",
                other.kind()
            ))),
        }
    }

    /// Returns a zero-cost fork that can be mutated without affecting
    /// this store.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Returns a new store with the delta applied.
    ///
    /// Cost is proportional to the number of keys the delta touches.
    #[must_use]
    pub fn clone_with_delta(&self, delta: &Delta) -> Self {
        let mut next = self.fork();
        next.apply_delta(delta);
        next
    }

    /// Applies a delta in place.
    pub fn apply_delta(&mut self, delta: &Delta) {
        for key in &delta.deleted {
            self.objects.remove(key);
        }
        for (key, value) in &delta.updated {
            self.objects.insert(key.clone(), value.clone());
        }
    }

    /// Computes the delta that turns `base` into this store.
    pub fn delta_from(&self, base: &Store) -> Delta {
        let mut delta = Delta::new();
        if self.objects.ptr_eq(&base.objects) {
            return delta;
        }
        for (key, value) in &self.objects {
            if base.objects.get(key) != Some(value) {
                delta.set(key.clone(), value.clone());
            }
        }
        for key in base.objects.keys() {
            if !self.objects.contains_key(key) {
                delta.delete(key.clone());
            }
        }
        delta
    }

    /// Returns the object stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.objects.get(key)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Writes an object, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.objects.insert(key.into(), value)
    }

    /// Removes an object, returning it.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.objects.remove(key)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.objects.keys()
    }

    /// Iterates over entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.objects.iter()
    }

    /// Returns true if both stores share the same root, i.e. neither has
    /// been written since one was forked from the other.
    pub fn shares_root_with(&self, other: &Store) -> bool {
        self.objects.ptr_eq(&other.objects)
    }

    /// Renders the store as a `key -> object` map.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.objects
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// A store paired with the block it is known to be consistent through.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    store: Store,
    block_id: Option<BlockId>,
}

impl Snapshot {
    /// Creates the empty snapshot a client starts from.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot consistent through `block_id`.
    pub fn new(store: Store, block_id: BlockId) -> Self {
        Self {
            store,
            block_id: Some(block_id),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The block this snapshot is consistent through, if it was ever
    /// synchronized.
    pub fn block_id(&self) -> Option<&BlockId> {
        self.block_id.as_ref()
    }

    /// Returns a new snapshot with a block's delta applied.
    #[must_use]
    pub fn advance(&self, delta: &Delta, block_id: BlockId) -> Self {
        Self::new(self.store.clone_with_delta(delta), block_id)
    }

    /// Returns a mutable fork of the store for speculative writes.
    pub fn fork(&self) -> Store {
        self.store.fork()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn store_with(pairs: &[(&str, i64)]) -> Store {
        Store::from_objects(pairs.iter().map(|(k, v)| (k.to_string(), Value::Integer(*v))))
    }

    #[test]
    fn fork_is_isolated() {
        let base = store_with(&[("a", 1), ("b", 2)]);
        let mut fork = base.fork();
        assert!(fork.shares_root_with(&base));

        fork.set("a", Value::Integer(10));
        fork.delete("b");

        assert_eq!(base.get("a"), Some(&Value::Integer(1)));
        assert_eq!(base.get("b"), Some(&Value::Integer(2)));
        assert_eq!(fork.get("a"), Some(&Value::Integer(10)));
        assert!(!fork.contains_key("b"));
        assert!(!fork.shares_root_with(&base));
    }

    #[test]
    fn clone_with_delta_leaves_original() {
        let base = store_with(&[("a", 1), ("b", 2)]);
        let mut delta = Delta::new();
        delta.set("c", Value::Integer(3));
        delta.delete("a");

        let next = base.clone_with_delta(&delta);
        assert_eq!(base.len(), 2);
        assert_eq!(next.keys().cloned().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn delta_from_identical_fork_is_empty() {
        let base = store_with(&[("a", 1)]);
        assert!(base.fork().delta_from(&base).is_empty());
    }

    #[test]
    fn from_payload_shapes() {
        let payload = Value::map([("k", Value::map([("v", 1)]))]);
        let store = Store::from_payload(&payload).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.to_value(), payload);
        assert!(Store::from_payload(&Value::Null).unwrap().is_empty());
        assert!(matches!(
            Store::from_payload(&Value::Array(vec![])),
            Err(StoreError::InvalidObjects(_))
        ));
    }

    #[test]
    fn snapshot_advance() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.block_id().is_none());

        let mut delta = Delta::new();
        delta.set("x", Value::from("y"));
        let next = snapshot.advance(&delta, BlockId::from("B1"));
        assert_eq!(next.block_id(), Some(&BlockId::from("B1")));
        assert_eq!(next.store().get("x"), Some(&Value::from("y")));
        assert!(snapshot.store().is_empty());
    }

    proptest! {
        #[test]
        fn delta_from_reconstructs_target(
            base in proptest::collection::btree_map("[a-f]{1,2}", any::<i64>(), 0..12),
            target in proptest::collection::btree_map("[a-f]{1,2}", any::<i64>(), 0..12),
        ) {
            let to_store = |m: &BTreeMap<String, i64>| {
                Store::from_objects(m.iter().map(|(k, v)| (k.clone(), Value::Integer(*v))))
            };
            let base = to_store(&base);
            let target = to_store(&target);
            let delta = target.delta_from(&base);
            prop_assert_eq!(base.clone_with_delta(&delta), target);
        }
    }
}
