use crate::core::{NodeId, Value};
use hashbrown::{HashMap, HashSet};
use std::hash::Hash;

/// For each neighbor, the values it is known to hold: either pushed to it, or
/// received from it. Eager push skips anything recorded here.
#[derive(Clone, Debug)]
pub struct SentTracker<V = Value>
where
  V: Clone + Eq + Hash,
{
  sent: HashMap<NodeId, HashSet<V>>,
}
impl<V: Clone + Eq + Hash> SentTracker<V> {
  pub fn new() -> SentTracker<V> {
    SentTracker {
      sent: HashMap::new(),
    }
  }

  /// Forgets everything and opens one empty entry per neighbor.
  pub fn reset<'a, I>(&mut self, neighbors: I)
  where
    I: IntoIterator<Item = &'a NodeId>,
  {
    self.sent = neighbors
      .into_iter()
      .map(|n| (n.clone(), HashSet::new()))
      .collect();
  }

  /// Records `value` against `neighbor`. Returns `true` only if the neighbor
  /// is tracked and the value was not recorded yet.
  pub fn mark(&mut self, neighbor: &NodeId, value: V) -> bool {
    match self.sent.get_mut(neighbor) {
      Some(values) => values.insert(value),
      None => false,
    }
  }

  pub fn mark_all<I>(&mut self, neighbor: &NodeId, values: I)
  where
    I: IntoIterator<Item = V>,
  {
    if let Some(sent) = self.sent.get_mut(neighbor) {
      sent.extend(values);
    }
  }

  pub fn has_sent(&self, neighbor: &NodeId, value: &V) -> bool {
    self
      .sent
      .get(neighbor)
      .map(|values| values.contains(value))
      .unwrap_or(false)
  }

  /// How many values are recorded for `neighbor`, `None` if untracked.
  pub fn tracked(&self, neighbor: &NodeId) -> Option<usize> {
    self.sent.get(neighbor).map(HashSet::len)
  }
}
impl<V: Clone + Eq + Hash> Default for SentTracker<V> {
  fn default() -> Self {
    SentTracker::new()
  }
}

#[test]
fn test_mark_once_per_neighbor() {
  let n2 = NodeId::from("n2");
  let n3 = NodeId::from("n3");
  let mut sent = SentTracker::<Value>::new();
  sent.reset(vec![&n2, &n3]);
  assert!(sent.mark(&n2, 5));
  assert!(!sent.mark(&n2, 5));
  assert!(sent.mark(&n3, 5));
  assert!(sent.has_sent(&n2, &5));
  assert!(!sent.has_sent(&n2, &6));
}

#[test]
fn test_untracked_neighbors_are_ignored() {
  let mut sent = SentTracker::<Value>::new();
  let stranger = NodeId::from("n9");
  assert!(!sent.mark(&stranger, 1));
  sent.mark_all(&stranger, vec![1, 2]);
  assert_eq!(sent.tracked(&stranger), None);
}

#[test]
fn test_reset_clears_history() {
  let n2 = NodeId::from("n2");
  let mut sent = SentTracker::<Value>::new();
  sent.reset(vec![&n2]);
  sent.mark_all(&n2, vec![1, 2, 3]);
  assert_eq!(sent.tracked(&n2), Some(3));
  sent.reset(vec![&n2]);
  assert_eq!(sent.tracked(&n2), Some(0));
}
