use crate::core::{ConfigError, NodeId};
use serde::{Deserialize, Serialize};
use std::env::var;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configures a [`BroadcastNode`](crate::broadcast::BroadcastNode).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
  /// The time between two anti-entropy gossip rounds.
  ///
  /// default: `200 milliseconds`
  pub gossip_interval: Duration,
  /// The time between initialization and the first gossip round.
  ///
  /// default: `1 second`
  pub gossip_warmup: Duration,
  /// Whether periodic gossip runs at all. With gossip off the node relies on
  /// eager push alone and cannot repair values lost to a partition. Only
  /// useful for comparing the two modes.
  ///
  /// default: `true`
  pub gossip_enabled: bool,
  /// The number of neighbors sent the full value set each round.
  ///
  /// default: `1`
  pub gossip_fanout: usize,
  /// How gossip targets are picked among the neighbors.
  ///
  /// default: [`GossipSelector::Random`]
  pub selector: GossipSelector,
  /// Which senders of `broadcast` get a `broadcast_ok`.
  ///
  /// default: [`AckPolicy::All`]
  pub ack_policy: AckPolicy,
}
impl Default for NodeConfig {
  #[inline]
  fn default() -> Self {
    NodeConfig {
      gossip_interval: Duration::from_millis(200),
      gossip_warmup: Duration::from_millis(1000),
      gossip_enabled: true,
      gossip_fanout: 1,
      selector: GossipSelector::Random,
      ack_policy: AckPolicy::All,
    }
  }
}
impl NodeConfig {
  /// The defaults, overridden by any of `GOSSIP_INTERVAL_MS`,
  /// `GOSSIP_WARMUP_MS`, `GOSSIP_ENABLED`, `GOSSIP_FANOUT`, `GOSSIP_SELECTOR`
  /// and `ACK_POLICY` that are set and parse. Values that do not parse are
  /// logged and ignored.
  pub fn from_env() -> Self {
    let mut cfg = NodeConfig::default();
    if let Some(ms) = env_parse::<u64>("GOSSIP_INTERVAL_MS") {
      cfg.gossip_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = env_parse::<u64>("GOSSIP_WARMUP_MS") {
      cfg.gossip_warmup = Duration::from_millis(ms);
    }
    if let Some(enabled) = env_parse::<bool>("GOSSIP_ENABLED") {
      cfg.gossip_enabled = enabled;
    }
    if let Some(fanout) = env_parse::<usize>("GOSSIP_FANOUT") {
      cfg.gossip_fanout = fanout;
    }
    if let Some(selector) = env_parse::<GossipSelector>("GOSSIP_SELECTOR") {
      cfg.selector = selector;
    }
    if let Some(policy) = env_parse::<AckPolicy>("ACK_POLICY") {
      cfg.ack_policy = policy;
    }
    cfg
  }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T>
where
  T::Err: Display,
{
  parse_setting(key, var(key).ok())
}

fn parse_setting<T: FromStr>(key: &str, raw: Option<String>) -> Option<T>
where
  T::Err: Display,
{
  let raw = raw?;
  match raw.parse() {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(key = key, value = %raw, error = %e, "ignoring setting");
      None
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipSelector {
  /// Uniformly random, so no link is starved systematically.
  Random,
  /// Cycle through the neighbor list in topology order.
  RoundRobin,
}
impl FromStr for GossipSelector {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "random" => Ok(GossipSelector::Random),
      "round-robin" => Ok(GossipSelector::RoundRobin),
      _ => Err(ConfigError::UnknownVariant {
        field: "gossip selector",
        value: s.to_string(),
      }),
    }
  }
}

/// Who is owed a `broadcast_ok`.
///
/// Peers never wait for acknowledgments of the pushes they make, so answering
/// them only costs traffic. Clients, on the other hand, expect one per request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckPolicy {
  /// Acknowledge every sender.
  All,
  /// Acknowledge only senders named like clients, see
  /// [`NodeId::is_client`].
  ClientsOnly,
}
impl AckPolicy {
  pub fn acknowledges(&self, sender: &NodeId) -> bool {
    match self {
      AckPolicy::All => true,
      AckPolicy::ClientsOnly => sender.is_client(),
    }
  }
}
impl FromStr for AckPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "all" => Ok(AckPolicy::All),
      "clients-only" => Ok(AckPolicy::ClientsOnly),
      _ => Err(ConfigError::UnknownVariant {
        field: "ack policy",
        value: s.to_string(),
      }),
    }
  }
}

#[test]
fn test_ack_policy() {
  let client = NodeId::from("c3");
  let peer = NodeId::from("n2");
  assert!(AckPolicy::All.acknowledges(&client));
  assert!(AckPolicy::All.acknowledges(&peer));
  assert!(AckPolicy::ClientsOnly.acknowledges(&client));
  assert!(!AckPolicy::ClientsOnly.acknowledges(&peer));
}

#[test]
fn test_parse_options() {
  assert_eq!(
    "round-robin".parse::<GossipSelector>().ok(),
    Some(GossipSelector::RoundRobin)
  );
  assert_eq!(
    "clients-only".parse::<AckPolicy>().ok(),
    Some(AckPolicy::ClientsOnly)
  );
  assert!("sometimes".parse::<AckPolicy>().is_err());
}

#[test]
fn test_unparsable_settings_are_ignored() {
  let policy =
    parse_setting::<AckPolicy>("ACK_POLICY", Some("clientsonly".into()));
  assert_eq!(policy, None);
  let fanout = parse_setting::<usize>("GOSSIP_FANOUT", Some("3".into()));
  assert_eq!(fanout, Some(3));
  assert_eq!(parse_setting::<bool>("GOSSIP_ENABLED", None), None);
}
