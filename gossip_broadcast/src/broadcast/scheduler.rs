use crate::broadcast::NodeConfig;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Running,
}

/// Decides when the next gossip tick is due. Holds no timer itself: the node
/// schedules a [`NodeMsg::GossipTick`](crate::broadcast::NodeMsg) to its own
/// mailbox for whatever delay this returns, so ticks are serialized with every
/// other message.
///
/// There is no stopped state. Ticks continue until the process ends.
#[derive(Clone, Debug)]
pub struct GossipScheduler {
  state: SchedulerState,
  enabled: bool,
  warmup: Duration,
  interval: Duration,
}
impl GossipScheduler {
  pub fn new(config: &NodeConfig) -> GossipScheduler {
    GossipScheduler {
      state: SchedulerState::Idle,
      enabled: config.gossip_enabled,
      warmup: config.gossip_warmup,
      interval: config.gossip_interval,
    }
  }

  /// Called on init. Returns the delay to the first tick, or `None` if
  /// already running or gossip is disabled.
  pub fn start(&mut self) -> Option<Duration> {
    if self.state == SchedulerState::Running || !self.enabled {
      return None;
    }
    self.state = SchedulerState::Running;
    Some(self.warmup)
  }

  /// Called after each tick. Returns the delay to the next one.
  pub fn tick(&self) -> Option<Duration> {
    match self.state {
      SchedulerState::Running => Some(self.interval),
      SchedulerState::Idle => None,
    }
  }

  pub fn state(&self) -> SchedulerState {
    self.state
  }
}

#[test]
fn test_idle_until_started_once() {
  let cfg = NodeConfig::default();
  let mut sched = GossipScheduler::new(&cfg);
  assert_eq!(sched.state(), SchedulerState::Idle);
  assert_eq!(sched.tick(), None);
  assert_eq!(sched.start(), Some(cfg.gossip_warmup));
  assert_eq!(sched.state(), SchedulerState::Running);
  assert_eq!(sched.start(), None);
  assert_eq!(sched.tick(), Some(cfg.gossip_interval));
}

#[test]
fn test_disabled_gossip_never_runs() {
  let mut cfg = NodeConfig::default();
  cfg.gossip_enabled = false;
  let mut sched = GossipScheduler::new(&cfg);
  assert_eq!(sched.start(), None);
  assert_eq!(sched.state(), SchedulerState::Idle);
  assert_eq!(sched.tick(), None);
}
