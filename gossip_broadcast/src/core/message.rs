use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The unit being broadcast. Integers on the wire.
pub type Value = i64;

/// Identifier of a node or client, e.g. `n1` or `c7`.
#[derive(
  Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct NodeId(String);
impl NodeId {
  pub fn new<S: Into<String>>(id: S) -> NodeId {
    NodeId(id.into())
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }

  /// Clients are named `c<n>`, servers `n<n>`.
  pub fn is_client(&self) -> bool {
    self.0.starts_with('c')
  }
}
impl From<&str> for NodeId {
  fn from(s: &str) -> Self {
    NodeId(s.to_string())
  }
}
impl From<String> for NodeId {
  fn from(s: String) -> Self {
    NodeId(s)
  }
}
impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
  pub src: NodeId,
  pub dest: NodeId,
  pub body: Body,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Body {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub msg_id: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub in_reply_to: Option<u64>,
  #[serde(flatten)]
  pub payload: Payload,
}

/// Every body type this node speaks, tagged by the `type` field.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
  Init {
    node_id: NodeId,
    node_ids: Vec<NodeId>,
  },
  InitOk,
  Topology {
    topology: BTreeMap<NodeId, Vec<NodeId>>,
  },
  TopologyOk,
  Broadcast {
    message: Value,
  },
  BroadcastOk,
  Read,
  ReadOk {
    messages: Vec<Value>,
  },
  Gossip {
    messages: Vec<Value>,
  },
  GossipOk,
  Echo {
    echo: serde_json::Value,
  },
  EchoOk {
    echo: serde_json::Value,
  },
  Generate,
  GenerateOk {
    id: String,
  },
  /// A `type` tag this node does not know. Only produced by the decoder.
  #[serde(skip)]
  Unrecognized(String),
}
impl Payload {
  pub fn kind(&self) -> &str {
    match self {
      Payload::Init { .. } => "init",
      Payload::InitOk => "init_ok",
      Payload::Topology { .. } => "topology",
      Payload::TopologyOk => "topology_ok",
      Payload::Broadcast { .. } => "broadcast",
      Payload::BroadcastOk => "broadcast_ok",
      Payload::Read => "read",
      Payload::ReadOk { .. } => "read_ok",
      Payload::Gossip { .. } => "gossip",
      Payload::GossipOk => "gossip_ok",
      Payload::Echo { .. } => "echo",
      Payload::EchoOk { .. } => "echo_ok",
      Payload::Generate => "generate",
      Payload::GenerateOk { .. } => "generate_ok",
      Payload::Unrecognized(kind) => kind.as_str(),
    }
  }

  pub fn is_known(kind: &str) -> bool {
    matches!(
      kind,
      "init"
        | "init_ok"
        | "topology"
        | "topology_ok"
        | "broadcast"
        | "broadcast_ok"
        | "read"
        | "read_ok"
        | "gossip"
        | "gossip_ok"
        | "echo"
        | "echo_ok"
        | "generate"
        | "generate_ok"
    )
  }

  /// Replies are never awaited, so the dispatcher drops every one of them.
  pub fn is_reply(&self) -> bool {
    self.kind().ends_with("_ok")
  }
}

#[cfg(test)]
use maplit::btreemap;

#[test]
fn test_payload_kinds_agree_with_serde_tags() {
  let payloads = vec![
    Payload::Init {
      node_id: "n1".into(),
      node_ids: vec!["n1".into()],
    },
    Payload::InitOk,
    Payload::Topology {
      topology: btreemap! { NodeId::from("n1") => vec![] },
    },
    Payload::TopologyOk,
    Payload::Broadcast { message: 1 },
    Payload::BroadcastOk,
    Payload::Read,
    Payload::ReadOk { messages: vec![] },
    Payload::Gossip { messages: vec![] },
    Payload::GossipOk,
    Payload::Echo { echo: serde_json::json!("hi") },
    Payload::EchoOk { echo: serde_json::json!("hi") },
    Payload::Generate,
    Payload::GenerateOk { id: "n1-1".to_string() },
  ];
  for p in payloads {
    let json = serde_json::to_value(&p).unwrap();
    assert_eq!(json["type"], serde_json::json!(p.kind()));
    assert!(Payload::is_known(p.kind()));
  }
  assert!(!Payload::is_known("txn"));
}

#[test]
fn test_reply_classification() {
  assert!(Payload::GossipOk.is_reply());
  assert!(Payload::Unrecognized("cas_ok".to_string()).is_reply());
  assert!(!Payload::Read.is_reply());
  assert!(!Payload::Unrecognized("cas".to_string()).is_reply());
}

#[test]
fn test_client_naming() {
  assert!(NodeId::from("c12").is_client());
  assert!(!NodeId::from("n3").is_client());
}
