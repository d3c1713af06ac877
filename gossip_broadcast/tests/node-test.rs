use gossip_broadcast::broadcast::{serve_io, BroadcastNode, NodeConfig};
use gossip_broadcast::core::{codec, Body, Envelope, LocalRef, NodeId, Payload};
use maplit::btreemap;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, Instant};

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

fn setup() -> Vec<Envelope> {
  vec![
    request(
      "c0",
      1,
      Payload::Init {
        node_id: "n1".into(),
        node_ids: vec!["n1".into(), "n2".into()],
      },
    ),
    request(
      "c0",
      2,
      Payload::Topology {
        topology: btreemap! { NodeId::from("n1") => vec![NodeId::from("n2")] },
      },
    ),
    request("c1", 3, Payload::Broadcast { message: 3 }),
  ]
}

fn outbox() -> (LocalRef<Envelope>, UnboundedReceiver<Envelope>) {
  let (tx, rx) = unbounded_channel();
  (LocalRef::new(move |env| tx.send(env).is_ok()), rx)
}

async fn kinds(rx: &mut UnboundedReceiver<Envelope>, n: usize) -> Vec<String> {
  let mut kinds = Vec::new();
  for _ in 0..n {
    let env = rx.recv().await.unwrap();
    kinds.push(env.body.payload.kind().to_string());
  }
  kinds
}

#[tokio::test]
async fn stdio_session() {
  let input = concat!(
    r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1","n2"]}}"#,
    "\n",
    r#"{"src":"c0","dest":"n1","body":{"type":"topology","msg_id":2,"topology":{"n1":["n2"],"n2":["n1"]}}}"#,
    "\n",
    "this is not json\n",
    r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","msg_id":3,"message":7}}"#,
    "\n",
    r#"{"src":"n2","dest":"n1","body":{"type":"broadcast_ok","in_reply_to":0}}"#,
    "\n",
    r#"{"src":"c1","dest":"n1","body":{"type":"read","msg_id":4}}"#,
    "\n",
    r#"{"src":"c1","dest":"n1","body":{"type":"echo","msg_id":5,"echo":"hello"}}"#,
    "\n",
  );
  let mut cfg = NodeConfig::default();
  cfg.gossip_enabled = false;
  let output = serve_io(input.as_bytes(), Vec::new(), cfg).await.unwrap();
  let text = String::from_utf8(output).unwrap();
  let out: Vec<Envelope> =
    text.lines().map(|l| codec::decode(l).unwrap()).collect();
  let summary: Vec<(&str, &str, Option<u64>, Option<u64>)> = out
    .iter()
    .map(|env| {
      (
        env.dest.as_str(),
        env.body.payload.kind(),
        env.body.msg_id,
        env.body.in_reply_to,
      )
    })
    .collect();
  assert_eq!(
    summary,
    vec![
      ("c0", "init_ok", None, Some(1)),
      ("c0", "topology_ok", None, Some(2)),
      ("n2", "broadcast", Some(0), None),
      ("c1", "broadcast_ok", None, Some(3)),
      ("c1", "read_ok", None, Some(4)),
      ("c1", "echo_ok", None, Some(5)),
    ]
  );
  assert_eq!(out[4].body.payload, Payload::ReadOk { messages: vec![7] });
  assert_eq!(
    out[5].body.payload,
    Payload::EchoOk {
      echo: serde_json::json!("hello")
    }
  );
  assert!(out.iter().all(|env| env.src == NodeId::from("n1")));
}

#[tokio::test(start_paused = true)]
async fn gossip_starts_after_warmup_and_repeats() {
  let cfg = NodeConfig::default();
  let (warmup, interval) = (cfg.gossip_warmup, cfg.gossip_interval);
  let (out, mut rx) = outbox();
  let node = BroadcastNode::spawn(cfg, out);
  let start = Instant::now();
  for env in setup() {
    node.local().send(env.into());
  }
  assert_eq!(
    kinds(&mut rx, 4).await,
    vec!["init_ok", "topology_ok", "broadcast", "broadcast_ok"]
  );
  assert!(start.elapsed() < warmup);

  let first = rx.recv().await.unwrap();
  assert!(start.elapsed() >= warmup);
  assert_eq!(first.dest, NodeId::from("n2"));
  assert_eq!(first.body.payload, Payload::Gossip { messages: vec![3] });

  let second = rx.recv().await.unwrap();
  assert!(start.elapsed() >= warmup + interval);
  assert_eq!(second.body.payload, Payload::Gossip { messages: vec![3] });
  assert!(second.body.msg_id > first.body.msg_id);
  node.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn eager_only_node_never_gossips() {
  let mut cfg = NodeConfig::default();
  cfg.gossip_enabled = false;
  let (out, mut rx) = outbox();
  let node = BroadcastNode::spawn(cfg, out);
  for env in setup() {
    node.local().send(env.into());
  }
  assert_eq!(kinds(&mut rx, 4).await.len(), 4);
  sleep(Duration::from_secs(10)).await;
  assert!(rx.try_recv().is_err());
  node.stop().await.unwrap();
}

#[tokio::test]
async fn stop_drains_queued_messages() {
  let (out, mut rx) = outbox();
  let node = BroadcastNode::spawn(NodeConfig::default(), out);
  for env in setup() {
    node.local().send(env.into());
  }
  node.local().send(request("c1", 4, Payload::Read).into());
  node.stop().await.unwrap();
  let mut last = None;
  while let Some(env) = rx.recv().await {
    last = Some(env);
  }
  assert_eq!(
    last.map(|env| env.body.payload),
    Some(Payload::ReadOk { messages: vec![3] })
  );
}

#[tokio::test]
async fn invalid_utf8_line_does_not_stop_the_node() {
  let mut input = b"\xff\xfe garbage\n".to_vec();
  input.extend_from_slice(
    br#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1"]}}"#,
  );
  input.push(b'\n');
  let mut cfg = NodeConfig::default();
  cfg.gossip_enabled = false;
  let output = serve_io(&input[..], Vec::new(), cfg).await.unwrap();
  let text = String::from_utf8(output).unwrap();
  let out: Vec<Envelope> =
    text.lines().map(|l| codec::decode(l).unwrap()).collect();
  assert_eq!(out.len(), 1);
  assert_eq!(out[0].body.payload, Payload::InitOk);
  assert_eq!(out[0].body.in_reply_to, Some(1));
}
