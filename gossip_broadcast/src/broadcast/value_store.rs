use crate::core::Value;
use itertools::Itertools;
use std::hash::Hash;

/// Every value this node has ever seen. A grow-only set: values are inserted,
/// never removed, so merging two stores is plain union.
#[derive(Clone, Debug)]
pub struct ValueStore<V = Value>
where
  V: Clone + Eq + Hash,
{
  values: im::HashSet<V>,
}
impl<V: Clone + Eq + Hash> ValueStore<V> {
  pub fn new() -> ValueStore<V> {
    ValueStore {
      values: im::HashSet::new(),
    }
  }

  /// Returns whether `value` was absent before. This is the only dedup check
  /// in the node.
  pub fn insert(&mut self, value: V) -> bool {
    self.values.insert(value).is_none()
  }

  pub fn contains(&self, value: &V) -> bool {
    self.values.contains(value)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// The current set. Structural sharing makes this constant time, and later
  /// inserts do not show up in it.
  pub fn snapshot(&self) -> im::HashSet<V> {
    self.values.clone()
  }

  pub fn sorted(&self) -> Vec<V>
  where
    V: Ord,
  {
    self.values.iter().cloned().sorted().collect()
  }
}
impl<V: Clone + Eq + Hash> Default for ValueStore<V> {
  fn default() -> Self {
    ValueStore::new()
  }
}

#[test]
fn test_insert_is_idempotent() {
  let mut store = ValueStore::<Value>::new();
  assert!(store.insert(5));
  assert!(!store.insert(5));
  assert_eq!(store.len(), 1);
  assert!(store.contains(&5));
}

#[test]
fn test_snapshot_is_frozen() {
  let mut store = ValueStore::<Value>::new();
  store.insert(3);
  store.insert(1);
  let snap = store.snapshot();
  store.insert(2);
  assert_eq!(snap.len(), 2);
  assert_eq!(store.sorted(), vec![1, 2, 3]);
}

#[test]
fn test_generic_over_hashable_values() {
  let mut store = ValueStore::<String>::new();
  assert!(store.insert("a".to_string()));
  assert!(!store.insert("a".to_string()));
  assert!(!store.is_empty());
}
