// A broadcast node speaking newline-delimited JSON on stdin and stdout.

use clap::Parser;
use gossip_broadcast::broadcast::{serve, AckPolicy, GossipSelector, NodeConfig};
use gossip_broadcast::core::NodeError;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "broadcast-node")]
#[command(about = "Gossip broadcast node over stdin/stdout", long_about = None)]
struct Cli {
  /// Milliseconds between gossip rounds
  #[arg(long)]
  gossip_interval_ms: Option<u64>,

  /// Milliseconds from init to the first gossip round
  #[arg(long)]
  gossip_warmup_ms: Option<u64>,

  /// Rely on eager push alone
  #[arg(long)]
  no_gossip: bool,

  /// Neighbors gossiped to per round
  #[arg(long)]
  fanout: Option<usize>,

  /// Gossip target selection (random, round-robin)
  #[arg(long)]
  selector: Option<GossipSelector>,

  /// Who gets a broadcast_ok (all, clients-only)
  #[arg(long)]
  ack_policy: Option<AckPolicy>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}
impl Cli {
  fn config(&self) -> NodeConfig {
    let mut cfg = NodeConfig::from_env();
    if let Some(ms) = self.gossip_interval_ms {
      cfg.gossip_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = self.gossip_warmup_ms {
      cfg.gossip_warmup = Duration::from_millis(ms);
    }
    if self.no_gossip {
      cfg.gossip_enabled = false;
    }
    if let Some(fanout) = self.fanout {
      cfg.gossip_fanout = fanout;
    }
    if let Some(selector) = self.selector {
      cfg.selector = selector;
    }
    if let Some(policy) = self.ack_policy {
      cfg.ack_policy = policy;
    }
    cfg
  }
}

#[tokio::main]
async fn main() -> Result<(), NodeError> {
  let cli = Cli::parse();

  // stdout carries the protocol, so logs go to stderr.
  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  let config = cli.config();
  tracing::info!(?config, "starting");
  serve(config).await
}
