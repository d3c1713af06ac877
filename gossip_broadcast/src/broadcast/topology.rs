use crate::core::NodeId;
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::BTreeMap;

pub type Neighbors = SmallVec<[NodeId; 4]>;

/// This node's direct neighbors, in the order the topology lists them.
#[derive(Clone, Debug, Default)]
pub struct Topology {
  neighbors: Neighbors,
}
impl Topology {
  /// Keeps only `me`'s entry of `mapping` and replaces the previous neighbor
  /// list with it. Self-references and repeats are dropped. A mapping without
  /// an entry for `me` leaves the node with no neighbors.
  pub fn replace(
    &mut self,
    me: &NodeId,
    mut mapping: BTreeMap<NodeId, Vec<NodeId>>,
  ) -> &[NodeId] {
    self.neighbors = mapping
      .remove(me)
      .unwrap_or_default()
      .into_iter()
      .filter(|n| n != me)
      .unique()
      .collect();
    &self.neighbors
  }

  pub fn neighbors(&self) -> &[NodeId] {
    &self.neighbors
  }

  pub fn contains(&self, node: &NodeId) -> bool {
    self.neighbors.contains(node)
  }

  pub fn is_empty(&self) -> bool {
    self.neighbors.is_empty()
  }
}

#[cfg(test)]
use maplit::btreemap;

#[cfg(test)]
fn ids(names: &[&str]) -> Vec<NodeId> {
  names.iter().map(|n| NodeId::from(*n)).collect()
}

#[test]
fn test_replace_keeps_own_entry_only() {
  let me = NodeId::from("n2");
  let mut topo = Topology::default();
  let mapping = btreemap! {
    NodeId::from("n1") => ids(&["n2"]),
    NodeId::from("n2") => ids(&["n1", "n3"]),
    NodeId::from("n3") => ids(&["n2"]),
  };
  assert_eq!(topo.replace(&me, mapping.clone()), &ids(&["n1", "n3"])[..]);
  assert_eq!(topo.replace(&me, mapping), &ids(&["n1", "n3"])[..]);
  assert!(topo.contains(&NodeId::from("n3")));
  assert!(!topo.contains(&NodeId::from("n2")));
}

#[test]
fn test_replace_discards_previous_neighbors() {
  let me = NodeId::from("n1");
  let mut topo = Topology::default();
  topo.replace(&me, btreemap! { me.clone() => ids(&["n2", "n3"]) });
  topo.replace(&me, btreemap! { me.clone() => ids(&["n4", "n1", "n4"]) });
  assert_eq!(topo.neighbors(), &ids(&["n4"])[..]);
  topo.replace(&me, btreemap! { NodeId::from("n9") => ids(&["n1"]) });
  assert!(topo.is_empty());
}
