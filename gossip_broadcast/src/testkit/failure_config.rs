use crate::core::NodeId;
use im::{HashMap, HashSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an unreliable link treats each message crossing it.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FailureConfig {
  pub drop_prob: f64,
  /// Lower and upper bound on the extra latency, drawn uniformly.
  pub delay: Option<(Duration, Duration)>,
}
impl FailureConfig {
  pub fn lossy(drop_prob: f64) -> FailureConfig {
    FailureConfig {
      drop_prob: drop_prob,
      delay: None,
    }
  }

  /// `None` if the message is dropped, otherwise the delay it suffers.
  pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<Duration> {
    if self.drop_prob > 0.0 && rng.gen::<f64>() < self.drop_prob {
      return None;
    }
    Some(match self.delay {
      Some((min, max)) if max > min => {
        let ms = rng.gen_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(ms as u64)
      }
      Some((min, _)) => min,
      None => Duration::ZERO,
    })
  }
}

/// Failure settings for a whole cluster: one default, overrides per directed
/// link, and partitions that cut links in both directions.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct FailureConfigMap {
  pub cluster_wide: FailureConfig,
  pub link_wide: HashMap<(NodeId, NodeId), FailureConfig>,
  partitions: HashSet<(NodeId, NodeId)>,
}
impl FailureConfigMap {
  pub fn get(&self, src: &NodeId, dest: &NodeId) -> &FailureConfig {
    self
      .link_wide
      .get(&(src.clone(), dest.clone()))
      .unwrap_or(&self.cluster_wide)
  }

  /// Cuts the link between `a` and `b` until healed.
  pub fn partition(&mut self, a: &NodeId, b: &NodeId) {
    self.partitions.insert(link(a, b));
  }

  pub fn heal(&mut self, a: &NodeId, b: &NodeId) {
    self.partitions.remove(&link(a, b));
  }

  pub fn heal_all(&mut self) {
    self.partitions.clear();
  }

  pub fn is_partitioned(&self, a: &NodeId, b: &NodeId) -> bool {
    self.partitions.contains(&link(a, b))
  }
}

fn link(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
  if a <= b {
    (a.clone(), b.clone())
  } else {
    (b.clone(), a.clone())
  }
}

#[cfg(test)]
use rand::rngs::SmallRng;
#[cfg(test)]
use rand::SeedableRng;

#[test]
fn test_partitions_are_symmetric() {
  let n1 = NodeId::from("n1");
  let n2 = NodeId::from("n2");
  let mut map = FailureConfigMap::default();
  map.partition(&n2, &n1);
  assert!(map.is_partitioned(&n1, &n2));
  map.heal(&n1, &n2);
  assert!(!map.is_partitioned(&n2, &n1));
}

#[test]
fn test_link_overrides_cluster_default() {
  let n1 = NodeId::from("n1");
  let n2 = NodeId::from("n2");
  let mut map = FailureConfigMap::default();
  map.link_wide.insert((n1.clone(), n2.clone()), FailureConfig::lossy(1.0));
  assert_eq!(map.get(&n1, &n2).drop_prob, 1.0);
  assert_eq!(map.get(&n2, &n1).drop_prob, 0.0);
}

#[test]
fn test_sample_respects_bounds() {
  let mut rng = SmallRng::seed_from_u64(3);
  assert_eq!(FailureConfig::lossy(1.0).sample(&mut rng), None);
  assert_eq!(FailureConfig::default().sample(&mut rng), Some(Duration::ZERO));
  let slow = FailureConfig {
    drop_prob: 0.0,
    delay: Some((Duration::from_millis(5), Duration::from_millis(10))),
  };
  for _ in 0..50 {
    let d = slow.sample(&mut rng).unwrap();
    assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
  }
}
