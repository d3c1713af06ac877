use crate::broadcast::{BroadcastNode, NodeConfig};
use crate::core::stdio::{read_envelopes, spawn_writer};
use crate::core::NodeError;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::info;

/// Runs a node over the process's stdin and stdout until stdin closes.
pub async fn serve(config: NodeConfig) -> Result<(), NodeError> {
  serve_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), config)
    .await?;
  Ok(())
}

/// Runs a node reading envelopes from `input` and writing them to `output`.
///
/// At end of input the node finishes every message already in its mailbox,
/// then the output is flushed and handed back. A gossip tick still pending at
/// that point is abandoned.
pub async fn serve_io<R, W>(
  input: R,
  output: W,
  config: NodeConfig,
) -> Result<W, NodeError>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin + Send + 'static,
{
  let (outbox, writer) = spawn_writer(output);
  let node = BroadcastNode::spawn(config, outbox);
  let inbox = node.local().transform();
  let read = read_envelopes(input, &inbox).await;
  drop(inbox);
  node.stop().await?;
  let forwarded = read?;
  info!(envelopes = forwarded, "end of input");
  Ok(writer.await??)
}
