use crate::broadcast::BroadcastNode;
use crate::core::responders;
use crate::core::{Body, DispatchError, Envelope, NodeId, Payload};
use itertools::Itertools;
use tracing::{debug, info, trace, warn};

impl BroadcastNode {
  /// Routes one inbound envelope and returns every envelope it causes: the
  /// reply to the sender, if one is owed, and any eager pushes.
  ///
  /// Nothing here fails loudly. Unknown types, replies, requests without a
  /// `msg_id` and requests arriving before `init` are logged and produce
  /// nothing.
  pub fn handle(&mut self, envelope: Envelope) -> Vec<Envelope> {
    match self.dispatch(envelope) {
      Ok(out) => out,
      Err(e) => {
        warn!(node = ?self.state.id, error = %e, "dropping message");
        vec![]
      }
    }
  }

  fn dispatch(
    &mut self,
    envelope: Envelope,
  ) -> Result<Vec<Envelope>, DispatchError> {
    let Envelope { src, dest, body } = envelope;
    if body.payload.is_reply() {
      trace!(src = %src, kind = body.payload.kind(), "ignoring reply");
      return Ok(vec![]);
    }
    if let Payload::Unrecognized(kind) = &body.payload {
      warn!(src = %src, kind = %kind, "unrecognized message type");
      return Ok(vec![]);
    }
    let msg_id = match body.msg_id {
      Some(msg_id) => msg_id,
      None => {
        return Err(DispatchError::MissingMsgId(
          body.payload.kind().to_string(),
          src,
        ))
      }
    };
    let me = match (&self.state.id, &body.payload) {
      (Some(me), _) => me.clone(),
      (None, Payload::Init { node_id, .. }) => node_id.clone(),
      (None, payload) => {
        return Err(DispatchError::NotInitialized(payload.kind().to_string()))
      }
    };
    if dest != me {
      debug!(node = %me, dest = %dest, "message addressed to another node");
    }

    let mut out = Vec::new();
    let reply = match body.payload {
      Payload::Init { node_id, node_ids } => {
        self.init(node_id, node_ids);
        Some(Payload::InitOk)
      }
      Payload::Topology { topology } => {
        self.state.engine.set_topology(&me, topology);
        info!(
          node = %me,
          neighbors = %self.state.engine.neighbors().iter().join(","),
          "topology replaced"
        );
        Some(Payload::TopologyOk)
      }
      Payload::Broadcast { message } => {
        let pushes = self.state.engine.accept(&src, message);
        out.extend(self.stamp_all(&me, pushes));
        if self.config.ack_policy.acknowledges(&src) {
          Some(Payload::BroadcastOk)
        } else {
          None
        }
      }
      Payload::Read => Some(Payload::ReadOk {
        messages: self.state.engine.store().sorted(),
      }),
      Payload::Gossip { messages } => {
        let (learned, pushes) = self.state.engine.merge(&src, messages);
        if learned > 0 {
          debug!(node = %me, src = %src, learned = learned, "merged gossip");
        }
        out.extend(self.stamp_all(&me, pushes));
        Some(Payload::GossipOk)
      }
      Payload::Echo { echo } => Some(responders::echo(echo)),
      Payload::Generate => Some(self.state.ids.next(&me)),
      Payload::InitOk
      | Payload::TopologyOk
      | Payload::BroadcastOk
      | Payload::ReadOk { .. }
      | Payload::GossipOk
      | Payload::EchoOk { .. }
      | Payload::GenerateOk { .. }
      | Payload::Unrecognized(_) => None,
    };
    if let Some(payload) = reply {
      out.push(Envelope {
        src: me,
        dest: src,
        body: Body {
          msg_id: None,
          in_reply_to: Some(msg_id),
          payload: payload,
        },
      });
    }
    Ok(out)
  }

  fn init(&mut self, node_id: NodeId, node_ids: Vec<NodeId>) {
    if let Some(me) = &self.state.id {
      if *me != node_id {
        warn!(
          node = %me,
          requested = %node_id,
          "already initialized, keeping id"
        );
      }
      return;
    }
    info!(node = %node_id, cluster = node_ids.len(), "initialized");
    self.state.id = Some(node_id);
    self.state.cluster = node_ids;
    self.pending_tick = self.scheduler.start();
  }
}

#[cfg(test)]
use crate::broadcast::{AckPolicy, NodeConfig, SchedulerState};
#[cfg(test)]
use crate::core::LocalRef;
#[cfg(test)]
use maplit::btreemap;

#[cfg(test)]
fn request(src: &str, msg_id: u64, payload: Payload) -> Envelope {
  Envelope {
    src: src.into(),
    dest: "n1".into(),
    body: Body {
      msg_id: Some(msg_id),
      in_reply_to: None,
      payload: payload,
    },
  }
}

#[cfg(test)]
fn initialized(config: NodeConfig) -> BroadcastNode {
  let mut node = BroadcastNode::new(config, LocalRef::void());
  node.handle(request(
    "c0",
    0,
    Payload::Init {
      node_id: "n1".into(),
      node_ids: vec!["n1".into(), "n2".into(), "n3".into()],
    },
  ));
  node
}

#[test]
fn test_init_and_reply_correlation() {
  let mut node = BroadcastNode::new(NodeConfig::default(), LocalRef::void());
  assert_eq!(node.scheduler().state(), SchedulerState::Idle);
  let out = node.handle(request(
    "c0",
    17,
    Payload::Init {
      node_id: "n1".into(),
      node_ids: vec!["n1".into()],
    },
  ));
  assert_eq!(
    out,
    vec![Envelope {
      src: "n1".into(),
      dest: "c0".into(),
      body: Body {
        msg_id: None,
        in_reply_to: Some(17),
        payload: Payload::InitOk,
      },
    }]
  );
  assert_eq!(node.scheduler().state(), SchedulerState::Running);
  assert_eq!(node.pending_tick, Some(node.config().gossip_warmup));
}

#[test]
fn test_repeated_init_keeps_identity() {
  let mut node = initialized(NodeConfig::default());
  node.pending_tick = None;
  let out = node.handle(request(
    "c0",
    1,
    Payload::Init {
      node_id: "n9".into(),
      node_ids: vec![],
    },
  ));
  assert_eq!(out[0].body.payload, Payload::InitOk);
  assert_eq!(node.state().id(), Some(&NodeId::from("n1")));
  assert_eq!(node.state().cluster().len(), 3);
  assert_eq!(node.pending_tick, None);
}

#[test]
fn test_requests_before_init_are_dropped() {
  let mut node = BroadcastNode::new(NodeConfig::default(), LocalRef::void());
  assert!(node
    .handle(request("c1", 1, Payload::Broadcast { message: 3 }))
    .is_empty());
  assert!(node.handle(request("c1", 2, Payload::Read)).is_empty());
  assert!(node.state().engine().store().is_empty());
}

#[test]
fn test_missing_msg_id_replies_and_unknowns_are_dropped() {
  let mut node = initialized(NodeConfig::default());
  let mut no_id = request("c1", 0, Payload::Broadcast { message: 3 });
  no_id.body.msg_id = None;
  assert!(node.handle(no_id).is_empty());
  assert!(node.state().engine().store().is_empty());
  assert!(node.handle(request("n2", 5, Payload::BroadcastOk)).is_empty());
  assert!(node
    .handle(request("c1", 6, Payload::Unrecognized("txn".to_string())))
    .is_empty());
}

#[test]
fn test_broadcast_pushes_then_acknowledges() {
  let mut node = initialized(NodeConfig::default());
  node.handle(request(
    "c1",
    1,
    Payload::Topology {
      topology: btreemap! {
        NodeId::from("n1") => vec!["n2".into(), "n3".into()],
      },
    },
  ));
  let out = node.handle(request("n2", 2, Payload::Broadcast { message: 5 }));
  assert_eq!(out.len(), 2);
  assert_eq!(out[0].dest, NodeId::from("n3"));
  assert_eq!(out[0].body.msg_id, Some(0));
  assert_eq!(out[0].body.payload, Payload::Broadcast { message: 5 });
  assert_eq!(out[1].dest, NodeId::from("n2"));
  assert_eq!(out[1].body.in_reply_to, Some(2));
  assert_eq!(out[1].body.payload, Payload::BroadcastOk);

  let again = node.handle(request("c1", 3, Payload::Broadcast { message: 5 }));
  assert_eq!(again.len(), 1);
  assert_eq!(again[0].body.payload, Payload::BroadcastOk);
}

#[test]
fn test_clients_only_ack_policy() {
  let mut cfg = NodeConfig::default();
  cfg.ack_policy = AckPolicy::ClientsOnly;
  let mut node = initialized(cfg);
  assert!(node
    .handle(request("n2", 1, Payload::Broadcast { message: 1 }))
    .is_empty());
  let out = node.handle(request("c4", 2, Payload::Broadcast { message: 2 }));
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].body.payload, Payload::BroadcastOk);
}

#[test]
fn test_read_echo_and_generate() {
  let mut node = initialized(NodeConfig::default());
  for (i, v) in vec![9, 2, 9, 4].into_iter().enumerate() {
    node.handle(request("c1", i as u64, Payload::Broadcast { message: v }));
  }
  let read = node.handle(request("c1", 10, Payload::Read));
  assert_eq!(read[0].body.payload, Payload::ReadOk { messages: vec![2, 4, 9] });
  let echo = node.handle(request(
    "c1",
    11,
    Payload::Echo {
      echo: serde_json::json!({"a": [1, 2]}),
    },
  ));
  assert_eq!(
    echo[0].body.payload,
    Payload::EchoOk {
      echo: serde_json::json!({"a": [1, 2]})
    }
  );
  let id = node.handle(request("c1", 12, Payload::Generate));
  assert_eq!(
    id[0].body.payload,
    Payload::GenerateOk {
      id: "n1-1".to_string()
    }
  );
}

#[test]
fn test_gossip_of_known_values_is_a_store_no_op() {
  let mut node = initialized(NodeConfig::default());
  node.handle(request(
    "c1",
    1,
    Payload::Topology {
      topology: btreemap! { NodeId::from("n1") => vec!["n2".into()] },
    },
  ));
  node.handle(request("n2", 2, Payload::Broadcast { message: 5 }));
  let out =
    node.handle(request("n2", 3, Payload::Gossip { messages: vec![5] }));
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].body.payload, Payload::GossipOk);
  assert_eq!(out[0].body.in_reply_to, Some(3));
  assert_eq!(node.state().engine().store().sorted(), vec![5]);
}
