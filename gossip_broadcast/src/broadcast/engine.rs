use crate::broadcast::{GossipSelector, SentTracker, Topology, ValueStore};
use crate::core::{NodeId, Payload, Value};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// A message the engine wants delivered. The caller stamps it with a `msg_id`
/// and the node's identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Push {
  pub to: NodeId,
  pub payload: Payload,
}

/// The propagation algorithm.
///
/// New values are pushed eagerly to every neighbor that might not have them.
/// Those pushes are never acknowledged, so some will be lost; the periodic
/// [`gossip_round`](PropagationEngine::gossip_round) sends the whole
/// [`ValueStore`] to a neighbor to repair whatever was missed. Since the store
/// is a grow-only set and merging is union, two nodes that keep gossiping end
/// up holding the same values no matter how messages were reordered, lost or
/// duplicated.
pub struct PropagationEngine {
  store: ValueStore,
  topology: Topology,
  sent: SentTracker,
  selector: GossipSelector,
  fanout: usize,
  cursor: usize,
  rng: SmallRng,
}
impl PropagationEngine {
  pub fn new(selector: GossipSelector, fanout: usize) -> PropagationEngine {
    Self::with_rng(selector, fanout, SmallRng::from_entropy())
  }

  pub fn with_rng(
    selector: GossipSelector,
    fanout: usize,
    rng: SmallRng,
  ) -> PropagationEngine {
    PropagationEngine {
      store: ValueStore::new(),
      topology: Topology::default(),
      sent: SentTracker::new(),
      selector: selector,
      fanout: fanout,
      cursor: 0,
      rng: rng,
    }
  }

  pub fn store(&self) -> &ValueStore {
    &self.store
  }

  pub fn neighbors(&self) -> &[NodeId] {
    self.topology.neighbors()
  }

  pub fn sent(&self) -> &SentTracker {
    &self.sent
  }

  /// Replaces the neighbor list and starts tracking each neighbor afresh.
  pub fn set_topology(
    &mut self,
    me: &NodeId,
    mapping: BTreeMap<NodeId, Vec<NodeId>>,
  ) {
    let neighbors = self.topology.replace(me, mapping);
    self.sent.reset(neighbors);
    self.cursor = 0;
  }

  /// Eager path for a value received in a `broadcast` from `from`. Known
  /// values produce nothing.
  pub fn accept(&mut self, from: &NodeId, value: Value) -> Vec<Push> {
    if !self.store.insert(value) {
      return vec![];
    }
    self.sent.mark(from, value);
    self.fan_out(from, value)
  }

  /// Merges the value set carried by a `gossip` from `from`. Values new to
  /// this node are recorded as held by `from` and then pushed on exactly like
  /// eagerly received ones.
  ///
  /// Returns how many values were new, and the pushes to make.
  pub fn merge<I>(&mut self, from: &NodeId, values: I) -> (usize, Vec<Push>)
  where
    I: IntoIterator<Item = Value>,
  {
    let mut learned = 0;
    let mut pushes = Vec::new();
    for value in values {
      if self.store.insert(value) {
        learned += 1;
        self.sent.mark(from, value);
        pushes.extend(self.fan_out(from, value));
      }
    }
    (learned, pushes)
  }

  /// One anti-entropy round: the entire store goes to the selected
  /// neighbors. Does nothing without neighbors or values.
  pub fn gossip_round(&mut self) -> Vec<Push> {
    if self.topology.is_empty() || self.store.is_empty() {
      return vec![];
    }
    let messages = self.store.sorted();
    let mut pushes = Vec::new();
    for target in self.select_targets() {
      self.sent.mark_all(&target, messages.iter().copied());
      pushes.push(Push {
        to: target,
        payload: Payload::Gossip {
          messages: messages.clone(),
        },
      });
    }
    pushes
  }

  fn fan_out(&mut self, from: &NodeId, value: Value) -> Vec<Push> {
    let mut pushes = Vec::new();
    for neighbor in self.topology.neighbors() {
      if neighbor != from && self.sent.mark(neighbor, value) {
        pushes.push(Push {
          to: neighbor.clone(),
          payload: Payload::Broadcast { message: value },
        });
      }
    }
    pushes
  }

  fn select_targets(&mut self) -> Vec<NodeId> {
    let neighbors = self.topology.neighbors();
    let amount = self.fanout.max(1).min(neighbors.len());
    match self.selector {
      GossipSelector::Random => neighbors
        .choose_multiple(&mut self.rng, amount)
        .cloned()
        .collect(),
      GossipSelector::RoundRobin => {
        let start = self.cursor % neighbors.len();
        self.cursor = (start + amount) % neighbors.len();
        neighbors
          .iter()
          .cycle()
          .skip(start)
          .take(amount)
          .cloned()
          .collect()
      }
    }
  }
}

#[cfg(test)]
use maplit::btreemap;

#[cfg(test)]
fn engine(
  me: &str,
  neighbors: &[&str],
  selector: GossipSelector,
) -> PropagationEngine {
  let mut e =
    PropagationEngine::with_rng(selector, 1, SmallRng::seed_from_u64(7));
  let me = NodeId::from(me);
  let neighbors: Vec<NodeId> =
    neighbors.iter().map(|n| NodeId::from(*n)).collect();
  e.set_topology(&me, btreemap! { me.clone() => neighbors });
  e
}

#[cfg(test)]
fn targets(pushes: &[Push]) -> Vec<&str> {
  pushes.iter().map(|p| p.to.as_str()).collect()
}

#[test]
fn test_accept_skips_sender_and_duplicates() {
  let mut e = engine("n2", &["n1", "n3"], GossipSelector::Random);
  let pushes = e.accept(&NodeId::from("n1"), 5);
  assert_eq!(targets(&pushes), vec!["n3"]);
  assert_eq!(pushes[0].payload, Payload::Broadcast { message: 5 });
  assert!(e.accept(&NodeId::from("c1"), 5).is_empty());
  assert!(e.sent().has_sent(&NodeId::from("n1"), &5));
}

#[test]
fn test_gossip_merge_marks_sender_and_forwards_new_values() {
  let mut e = engine("n2", &["n1", "n3"], GossipSelector::Random);
  e.accept(&NodeId::from("c1"), 1);
  let (learned, pushes) = e.merge(&NodeId::from("n1"), vec![1, 2, 2]);
  assert_eq!(learned, 1);
  assert_eq!(targets(&pushes), vec!["n3"]);
  assert_eq!(pushes[0].payload, Payload::Broadcast { message: 2 });
  assert!(e.sent().has_sent(&NodeId::from("n1"), &2));
  assert_eq!(e.store().sorted(), vec![1, 2]);
}

#[test]
fn test_merge_of_known_values_is_a_no_op() {
  let mut e = engine("n3", &["n2"], GossipSelector::Random);
  e.accept(&NodeId::from("n2"), 5);
  let (learned, pushes) = e.merge(&NodeId::from("n2"), vec![5]);
  assert_eq!(learned, 0);
  assert!(pushes.is_empty());
  assert_eq!(e.store().sorted(), vec![5]);
}

#[test]
fn test_gossip_round_needs_neighbors_and_values() {
  let mut lonely = engine("n1", &[], GossipSelector::Random);
  lonely.accept(&NodeId::from("c1"), 1);
  assert!(lonely.gossip_round().is_empty());
  let mut empty = engine("n1", &["n2"], GossipSelector::Random);
  assert!(empty.gossip_round().is_empty());
}

#[test]
fn test_gossip_round_sends_full_state_and_marks_it() {
  let mut e = engine("n1", &["n2"], GossipSelector::Random);
  e.accept(&NodeId::from("c1"), 3);
  e.merge(&NodeId::from("n2"), vec![1]);
  let pushes = e.gossip_round();
  assert_eq!(
    pushes,
    vec![Push {
      to: NodeId::from("n2"),
      payload: Payload::Gossip {
        messages: vec![1, 3]
      },
    }]
  );
  assert_eq!(e.sent().tracked(&NodeId::from("n2")), Some(2));
}

#[test]
fn test_round_robin_visits_every_neighbor() {
  let mut e = engine("n1", &["n2", "n3", "n4"], GossipSelector::RoundRobin);
  e.accept(&NodeId::from("c1"), 1);
  let order: Vec<String> = (0..4)
    .map(|_| e.gossip_round()[0].to.to_string())
    .collect();
  assert_eq!(order, vec!["n2", "n3", "n4", "n2"]);
}

#[test]
fn test_random_fanout_picks_distinct_neighbors() {
  let rng = SmallRng::seed_from_u64(1);
  let mut e = PropagationEngine::with_rng(GossipSelector::Random, 2, rng);
  let me = NodeId::from("n1");
  let neighbors: Vec<NodeId> = vec!["n2".into(), "n3".into(), "n4".into()];
  e.set_topology(&me, btreemap! { me.clone() => neighbors });
  e.accept(&NodeId::from("c1"), 1);
  for _ in 0..20 {
    let pushes = e.gossip_round();
    assert_eq!(pushes.len(), 2);
    assert_ne!(pushes[0].to, pushes[1].to);
  }
}
