use crate::core::NodeId;
use thiserror::Error;

/// A line that could not be turned into an [`Envelope`](crate::core::Envelope).
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("malformed envelope: {0}")]
  Json(#[from] serde_json::Error),
  #[error("body has no string `type` field")]
  MissingType,
  #[error("invalid `{kind}` body: {source}")]
  Body {
    kind: String,
    #[source]
    source: serde_json::Error,
  },
}

/// A well-formed envelope the node refuses to act on.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("`{0}` received before init")]
  NotInitialized(String),
  #[error("`{0}` request from {1} carries no msg_id")]
  MissingMsgId(String, NodeId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown {field} `{value}`")]
  UnknownVariant { field: &'static str, value: String },
}

/// Process-level failures. Nothing the protocol does ends up here.
#[derive(Debug, Error)]
pub enum NodeError {
  #[error("stdio: {0}")]
  Io(#[from] std::io::Error),
  #[error("task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}
