use gossip_broadcast::broadcast::{AckPolicy, GossipSelector, NodeConfig};
use gossip_broadcast::core::{NodeId, Payload, Value};
use gossip_broadcast::testkit::{FailureConfig, SimCluster};
use itertools::Itertools;
use maplit::btreemap;
use std::collections::{BTreeMap, HashMap};

fn ids(names: &[&str]) -> Vec<NodeId> {
  names.iter().map(|n| NodeId::from(*n)).collect()
}

fn line() -> BTreeMap<NodeId, Vec<NodeId>> {
  btreemap! {
    NodeId::from("n1") => ids(&["n2"]),
    NodeId::from("n2") => ids(&["n1", "n3"]),
    NodeId::from("n3") => ids(&["n2"]),
  }
}

/// A ring with a chord from every node to the one opposite.
fn ring(n: usize) -> (Vec<String>, BTreeMap<NodeId, Vec<NodeId>>) {
  let names = (1..=n).map(|i| format!("n{}", i)).collect_vec();
  let topology = (0..n)
    .map(|i| {
      let neighbors = vec![(i + 1) % n, (i + n - 1) % n, (i + n / 2) % n]
        .into_iter()
        .unique()
        .map(|j| NodeId::from(names[j].as_str()))
        .collect_vec();
      (NodeId::from(names[i].as_str()), neighbors)
    })
    .collect();
  (names, topology)
}

fn pushes_of(sim: &SimCluster, value: Value) -> Vec<(String, String)> {
  sim
    .traffic()
    .iter()
    .filter(|env| env.body.payload == Payload::Broadcast { message: value })
    .map(|env| (env.src.to_string(), env.dest.to_string()))
    .collect()
}

#[test]
fn line_topology_reaches_the_far_end() {
  let mut sim = SimCluster::new(&["n1", "n2", "n3"], NodeConfig::default(), 1);
  sim.set_topology(line());
  sim.broadcast("n1", 5);
  sim.deliver_all();
  assert_eq!(sim.read("n3"), Some(vec![5]));
  assert_eq!(
    pushes_of(&sim, 5),
    vec![
      ("n1".to_string(), "n2".to_string()),
      ("n2".to_string(), "n3".to_string())
    ]
  );
}

#[test]
fn gossip_repairs_a_healed_partition() {
  let cfg = NodeConfig {
    selector: GossipSelector::RoundRobin,
    ..NodeConfig::default()
  };
  let mut sim = SimCluster::new(&["n1", "n2", "n3"], cfg, 2);
  sim.set_topology(line());
  sim.failures_mut().partition(&"n2".into(), &"n3".into());
  sim.broadcast("n1", 5);
  sim.deliver_all();
  assert_eq!(sim.values("n2"), vec![5]);
  assert_eq!(sim.values("n3"), Vec::<Value>::new());

  sim.gossip_round();
  assert_eq!(sim.values("n3"), Vec::<Value>::new());

  sim.failures_mut().heal_all();
  for _ in 0..2 {
    sim.gossip_round();
  }
  assert_eq!(sim.read("n3"), Some(vec![5]));
  assert!(sim.converged());
}

#[test]
fn eager_only_mode_cannot_repair_a_partition() {
  let mut cfg = NodeConfig::default();
  cfg.gossip_enabled = false;
  let mut sim = SimCluster::new(&["n1", "n2", "n3"], cfg, 3);
  sim.set_topology(line());
  sim.failures_mut().partition(&"n2".into(), &"n3".into());
  sim.broadcast("n1", 5);
  sim.deliver_all();
  sim.failures_mut().heal_all();
  for _ in 0..10 {
    sim.gossip_round();
  }
  assert_eq!(sim.values("n3"), Vec::<Value>::new());
  assert!(!sim.converged());
}

#[test]
fn gossip_of_known_values_changes_nothing() {
  let mut sim = SimCluster::new(&["n1", "n2"], NodeConfig::default(), 4);
  sim.set_topology(btreemap! {
    NodeId::from("n1") => ids(&["n2"]),
    NodeId::from("n2") => ids(&["n1"]),
  });
  sim.broadcast("n2", 5);
  sim.deliver_all();
  sim.clear_traffic();
  let msg_id =
    sim.client_request("c2", "n2", Payload::Gossip { messages: vec![5] });
  let reply = sim.client_replies().last().cloned().unwrap();
  assert_eq!(reply.body.payload, Payload::GossipOk);
  assert_eq!(reply.body.in_reply_to, Some(msg_id));
  assert_eq!(sim.values("n2"), vec![5]);
  assert!(sim.traffic().is_empty());
}

#[test]
fn lossy_cluster_converges() {
  let (names, topology) = ring(10);
  let mut sim = SimCluster::new(&names, NodeConfig::default(), 5);
  sim.set_topology(topology);
  sim.failures_mut().cluster_wide = FailureConfig::lossy(0.3);
  for v in 0..20 {
    let at = names[(v as usize * 7) % names.len()].clone();
    sim.broadcast(&at, v);
  }
  sim.deliver_all();
  let mut rounds = 0;
  while !sim.converged() && rounds < 100 {
    sim.gossip_round();
    rounds += 1;
  }
  assert!(sim.converged(), "not converged after {} rounds", rounds);
  assert_eq!(sim.values("n4"), (0..20).collect_vec());
  assert!(sim.stats().dropped > 0);
}

#[test]
fn no_value_is_pushed_twice_over_a_link() {
  let names = ["n1", "n2", "n3", "n4"];
  let mut sim = SimCluster::new(&names, NodeConfig::default(), 6);
  let mesh = names
    .iter()
    .map(|me| {
      let others = names.iter().filter(|n| *n != me).map(|n| NodeId::from(*n));
      (NodeId::from(*me), others.collect_vec())
    })
    .collect();
  sim.set_topology(mesh);
  sim.broadcast("n1", 9);
  sim.broadcast("n3", 9);
  sim.deliver_all();
  let pushes = pushes_of(&sim, 9);
  assert!(!pushes.is_empty());
  assert_eq!(pushes.iter().unique().count(), pushes.len());
  assert!(sim.converged());
}

#[test]
fn repeated_broadcast_is_idempotent() {
  let mut sim = SimCluster::new(&["n1", "n2", "n3"], NodeConfig::default(), 7);
  sim.set_topology(line());
  for _ in 0..3 {
    sim.broadcast("n2", 4);
    sim.deliver_all();
  }
  assert_eq!(pushes_of(&sim, 4).len(), 2);
  for n in &["n1", "n2", "n3"] {
    assert_eq!(sim.values(n), vec![4]);
  }
}

#[test]
fn every_request_gets_exactly_one_correlated_reply() {
  let mut sim = SimCluster::new(&["n1", "n2"], NodeConfig::default(), 8);
  sim.set_topology(btreemap! {
    NodeId::from("n1") => ids(&["n2"]),
    NodeId::from("n2") => ids(&["n1"]),
  });
  let mut expected = HashMap::new();
  for i in 0..10 {
    let node = if i % 2 == 0 { "n1" } else { "n2" };
    expected.insert(sim.broadcast(node, i), "broadcast_ok");
    expected.insert(sim.client_request("c3", node, Payload::Read), "read_ok");
    let generate = sim.client_request("c3", node, Payload::Generate);
    expected.insert(generate, "generate_ok");
  }
  sim.deliver_all();
  let replies = sim
    .client_replies()
    .iter()
    .filter_map(|env| {
      env.body.in_reply_to.map(|id| (id, env.body.payload.kind()))
    })
    .filter(|(id, _)| expected.contains_key(id))
    .collect_vec();
  assert_eq!(replies.len(), expected.len());
  for (id, kind) in replies {
    assert_eq!(expected[&id], kind);
  }
}

#[test]
fn clients_only_policy_keeps_acks_off_peer_links() {
  let mut cfg = NodeConfig::default();
  cfg.ack_policy = AckPolicy::ClientsOnly;
  let mut sim = SimCluster::new(&["n1", "n2", "n3"], cfg, 9);
  sim.set_topology(line());
  sim.broadcast("n1", 1);
  sim.deliver_all();
  assert!(sim
    .traffic()
    .iter()
    .all(|env| env.body.payload != Payload::BroadcastOk));
  assert_eq!(
    sim
      .client_replies()
      .iter()
      .filter(|env| env.body.payload == Payload::BroadcastOk)
      .count(),
    1
  );
  assert!(sim.converged());
}
