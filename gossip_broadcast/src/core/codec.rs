use crate::core::{Body, CodecError, Envelope, NodeId, Payload};
use serde::Deserialize;
use serde_json::{Map, Value as Json};

#[derive(Deserialize)]
struct RawEnvelope {
  src: NodeId,
  dest: NodeId,
  body: Map<String, Json>,
}

/// Decodes one input line.
///
/// A body whose `type` is unknown still decodes, as
/// [`Payload::Unrecognized`]; a known `type` with missing or ill-typed fields
/// does not.
pub fn decode(line: &str) -> Result<Envelope, CodecError> {
  let raw: RawEnvelope = serde_json::from_str(line)?;
  let kind = match raw.body.get("type") {
    Some(Json::String(kind)) => kind.clone(),
    _ => return Err(CodecError::MissingType),
  };
  let body = if Payload::is_known(&kind) {
    serde_json::from_value::<Body>(Json::Object(raw.body))
      .map_err(|source| CodecError::Body { kind, source })?
  } else {
    Body {
      msg_id: raw.body.get("msg_id").and_then(Json::as_u64),
      in_reply_to: raw.body.get("in_reply_to").and_then(Json::as_u64),
      payload: Payload::Unrecognized(kind),
    }
  };
  Ok(Envelope {
    src: raw.src,
    dest: raw.dest,
    body: body,
  })
}

/// Encodes one output line, without the trailing newline.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
  Ok(serde_json::to_string(envelope)?)
}

#[test]
fn test_decode_topology() {
  let env = decode(
    r#"{"src":"c1","dest":"n1","body":{"type":"topology","msg_id":4,
    "topology":{"n1":["n2"],"n2":["n1","n3"],"n3":["n2"]}}}"#,
  )
  .unwrap();
  assert_eq!(env.src, NodeId::from("c1"));
  assert_eq!(env.body.msg_id, Some(4));
  match env.body.payload {
    Payload::Topology { topology } => {
      assert_eq!(topology[&NodeId::from("n2")].len(), 2);
    }
    other => panic!("decoded {:?}", other),
  }
}

#[test]
fn test_decode_unknown_type_is_not_an_error() {
  let env = decode(
    r#"{"src":"c1","dest":"n1","body":{"type":"txn","msg_id":9,"txn":[]}}"#,
  )
  .unwrap();
  assert_eq!(env.body.msg_id, Some(9));
  assert_eq!(env.body.payload, Payload::Unrecognized("txn".to_string()));
}

#[test]
fn test_decode_faults() {
  assert!(matches!(decode("not json"), Err(CodecError::Json(_))));
  assert!(matches!(
    decode(r#"{"src":"c1","dest":"n1","body":{"msg_id":1}}"#),
    Err(CodecError::MissingType)
  ));
  assert!(matches!(
    decode(r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","msg_id":1}}"#),
    Err(CodecError::Body { .. })
  ));
  assert!(matches!(
    decode(
      r#"{"src":"c1","dest":"n1","body":{"type":"broadcast","message":"x"}}"#
    ),
    Err(CodecError::Body { .. })
  ));
}

#[test]
fn test_encode_reply_shape() {
  let env = Envelope {
    src: "n1".into(),
    dest: "c1".into(),
    body: Body {
      msg_id: None,
      in_reply_to: Some(3),
      payload: Payload::ReadOk {
        messages: vec![1, 2],
      },
    },
  };
  let json: Json = serde_json::from_str(&encode(&env).unwrap()).unwrap();
  assert_eq!(
    json,
    serde_json::json!({
      "src": "n1",
      "dest": "c1",
      "body": {"type": "read_ok", "in_reply_to": 3, "messages": [1, 2]}
    })
  );
  assert_eq!(decode(&encode(&env).unwrap()).unwrap(), env);
}
