use crate::broadcast::{BroadcastNode, NodeConfig};
use crate::core::{Body, Envelope, LocalRef, NodeId, Payload, Value};
use crate::testkit::FailureConfigMap;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Duration;
use tracing::trace;

struct InFlight {
  at: Duration,
  seq: u64,
  envelope: Envelope,
}
impl PartialEq for InFlight {
  fn eq(&self, other: &Self) -> bool {
    (self.at, self.seq) == (other.at, other.seq)
  }
}
impl Eq for InFlight {}
impl PartialOrd for InFlight {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for InFlight {
  fn cmp(&self, other: &Self) -> Ordering {
    (self.at, self.seq).cmp(&(other.at, other.seq))
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
  pub sent: usize,
  pub dropped: usize,
  pub delivered: usize,
}

/// Several [`BroadcastNode`]s in one process, wired through a simulated
/// network.
///
/// Nothing runs on its own: messages move when [`step`](SimCluster::step) or
/// [`deliver_all`](SimCluster::deliver_all) is called and gossip happens when
/// [`tick_all`](SimCluster::tick_all) is. Node-to-node traffic passes through
/// a [`FailureConfigMap`] that may drop or delay it, with delays in virtual
/// time, so every run with the same seed is identical. Clients talk to nodes
/// over perfect links.
pub struct SimCluster {
  nodes: BTreeMap<NodeId, BroadcastNode>,
  failures: FailureConfigMap,
  rng: SmallRng,
  now: Duration,
  seq: u64,
  queue: BinaryHeap<Reverse<InFlight>>,
  client_inbox: Vec<Envelope>,
  traffic: Vec<Envelope>,
  stats: SimStats,
  next_client_msg_id: u64,
}
impl SimCluster {
  /// Creates and initializes one node per id.
  pub fn new<S: AsRef<str>>(
    ids: &[S],
    config: NodeConfig,
    seed: u64,
  ) -> SimCluster {
    let members: Vec<NodeId> =
      ids.iter().map(|id| id.as_ref().into()).collect();
    let mut nodes = BTreeMap::new();
    for (i, id) in members.iter().enumerate() {
      let rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64 + 1));
      let node = BroadcastNode::with_rng(config.clone(), LocalRef::void(), rng);
      nodes.insert(id.clone(), node);
    }
    let mut sim = SimCluster {
      nodes: nodes,
      failures: FailureConfigMap::default(),
      rng: SmallRng::seed_from_u64(seed),
      now: Duration::ZERO,
      seq: 0,
      queue: BinaryHeap::new(),
      client_inbox: Vec::new(),
      traffic: Vec::new(),
      stats: SimStats::default(),
      next_client_msg_id: 0,
    };
    for id in members.iter() {
      sim.client_request(
        "c0",
        id.as_str(),
        Payload::Init {
          node_id: id.clone(),
          node_ids: members.clone(),
        },
      );
    }
    sim
  }

  pub fn failures_mut(&mut self) -> &mut FailureConfigMap {
    &mut self.failures
  }

  pub fn node(&self, id: &str) -> Option<&BroadcastNode> {
    self.nodes.get(&NodeId::from(id))
  }

  /// Sends the same `topology` message to every node.
  pub fn set_topology(&mut self, topology: BTreeMap<NodeId, Vec<NodeId>>) {
    let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
    for id in ids {
      self.client_request(
        "c0",
        id.as_str(),
        Payload::Topology {
          topology: topology.clone(),
        },
      );
    }
  }

  /// Delivers a request from `client` straight to `node`. The node's reply
  /// lands in [`client_replies`](SimCluster::client_replies), everything else
  /// it sends goes onto the network.
  ///
  /// Returns the request's `msg_id`.
  pub fn client_request(
    &mut self,
    client: &str,
    node: &str,
    payload: Payload,
  ) -> u64 {
    let msg_id = self.next_client_msg_id;
    self.next_client_msg_id += 1;
    self.handle(Envelope {
      src: client.into(),
      dest: node.into(),
      body: Body {
        msg_id: Some(msg_id),
        in_reply_to: None,
        payload: payload,
      },
    });
    msg_id
  }

  pub fn broadcast(&mut self, node: &str, value: Value) -> u64 {
    self.client_request("c1", node, Payload::Broadcast { message: value })
  }

  /// Asks `node` for its values with a `read`, as a client would.
  pub fn read(&mut self, node: &str) -> Option<Vec<Value>> {
    let msg_id = self.client_request("c1", node, Payload::Read);
    self.client_replies().iter().rev().find_map(|env| {
      match (&env.body.in_reply_to, &env.body.payload) {
        (Some(id), Payload::ReadOk { messages }) if *id == msg_id => {
          Some(messages.clone())
        }
        _ => None,
      }
    })
  }

  /// Delivers the next message in flight. Returns `false` if there was none.
  pub fn step(&mut self) -> bool {
    match self.queue.pop() {
      Some(Reverse(flight)) => {
        self.now = self.now.max(flight.at);
        self.stats.delivered += 1;
        self.handle(flight.envelope);
        true
      }
      None => false,
    }
  }

  /// Delivers messages until none are in flight. Returns how many were
  /// delivered.
  pub fn deliver_all(&mut self) -> usize {
    let mut delivered = 0;
    while self.step() {
      delivered += 1;
    }
    delivered
  }

  /// Runs one gossip tick on every node, without delivering anything.
  pub fn tick_all(&mut self) {
    let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
    for id in ids {
      let out = match self.nodes.get_mut(&id) {
        Some(node) => node.tick(),
        None => continue,
      };
      for envelope in out {
        self.route(envelope);
      }
    }
  }

  /// A tick on every node, then delivery until the network is quiet.
  pub fn gossip_round(&mut self) {
    self.tick_all();
    self.deliver_all();
  }

  /// The values a node holds, sorted. Empty for unknown nodes.
  pub fn values(&self, id: &str) -> Vec<Value> {
    self
      .node(id)
      .map(|n| n.state().engine().store().sorted())
      .unwrap_or_default()
  }

  /// Whether every node holds the same values.
  pub fn converged(&self) -> bool {
    self
      .nodes
      .values()
      .map(|n| n.state().engine().store().sorted())
      .all_equal()
  }

  pub fn client_replies(&self) -> &[Envelope] {
    &self.client_inbox
  }

  /// Every envelope a node addressed to another node, in sending order,
  /// including ones the network then lost.
  pub fn traffic(&self) -> &[Envelope] {
    &self.traffic
  }

  pub fn clear_traffic(&mut self) {
    self.traffic.clear();
  }

  pub fn now(&self) -> Duration {
    self.now
  }

  pub fn stats(&self) -> SimStats {
    self.stats
  }

  fn handle(&mut self, envelope: Envelope) {
    let out = match self.nodes.get_mut(&envelope.dest) {
      Some(node) => node.handle(envelope),
      None => {
        trace!(dest = %envelope.dest, "no such node");
        return;
      }
    };
    for envelope in out {
      self.route(envelope);
    }
  }

  fn route(&mut self, envelope: Envelope) {
    if envelope.dest.is_client() {
      self.client_inbox.push(envelope);
      return;
    }
    self.stats.sent += 1;
    self.traffic.push(envelope.clone());
    let delay = if self.failures.is_partitioned(&envelope.src, &envelope.dest)
    {
      None
    } else {
      self
        .failures
        .get(&envelope.src, &envelope.dest)
        .sample(&mut self.rng)
    };
    match delay {
      Some(delay) => {
        self.seq += 1;
        self.queue.push(Reverse(InFlight {
          at: self.now + delay,
          seq: self.seq,
          envelope: envelope,
        }));
      }
      None => {
        trace!(src = %envelope.src, dest = %envelope.dest, "message lost");
        self.stats.dropped += 1;
      }
    }
  }
}

#[cfg(test)]
use maplit::btreemap;

#[test]
fn test_init_replies_reach_the_client() {
  let sim = SimCluster::new(&["n1", "n2"], NodeConfig::default(), 0);
  assert_eq!(sim.client_replies().len(), 2);
  assert!(sim
    .client_replies()
    .iter()
    .all(|env| env.body.payload == Payload::InitOk
      && env.dest == NodeId::from("c0")));
  assert_eq!(
    sim.node("n2").and_then(|n| n.state().id()),
    Some(&NodeId::from("n2"))
  );
}

#[test]
fn test_delays_are_applied_in_virtual_time() {
  let mut sim = SimCluster::new(&["n1", "n2"], NodeConfig::default(), 0);
  sim.set_topology(btreemap! {
    NodeId::from("n1") => vec![NodeId::from("n2")],
    NodeId::from("n2") => vec![NodeId::from("n1")],
  });
  sim.failures_mut().cluster_wide.delay =
    Some((Duration::from_millis(30), Duration::from_millis(30)));
  sim.broadcast("n1", 8);
  assert_eq!(sim.values("n2"), Vec::<Value>::new());
  sim.deliver_all();
  assert_eq!(sim.values("n2"), vec![8]);
  assert!(sim.now() >= Duration::from_millis(30));
  assert!(sim.converged());
}
