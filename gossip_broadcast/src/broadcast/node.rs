use crate::broadcast::{
  GossipScheduler, NodeConfig, PropagationEngine, Push, SchedulerState,
};
use crate::core::responders::IdGenerator;
use crate::core::{
  spawn, Actor, ActorContext, ActorHandle, Body, Envelope, LocalRef, NodeId,
};
use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything [`BroadcastNode`]'s mailbox carries.
#[derive(Clone, Debug)]
pub enum NodeMsg {
  Inbound(Envelope),
  GossipTick,
}
impl From<Envelope> for NodeMsg {
  fn from(envelope: Envelope) -> Self {
    NodeMsg::Inbound(envelope)
  }
}

/// The node's entire mutable state, owned by one actor.
pub struct NodeState {
  pub(crate) id: Option<NodeId>,
  pub(crate) cluster: Vec<NodeId>,
  pub(crate) engine: PropagationEngine,
  pub(crate) ids: IdGenerator,
  next_msg_id: u64,
}
impl NodeState {
  fn new(engine: PropagationEngine) -> NodeState {
    NodeState {
      id: None,
      cluster: Vec::new(),
      engine: engine,
      ids: IdGenerator::default(),
      next_msg_id: 0,
    }
  }

  pub fn id(&self) -> Option<&NodeId> {
    self.id.as_ref()
  }

  pub fn cluster(&self) -> &[NodeId] {
    &self.cluster
  }

  pub fn engine(&self) -> &PropagationEngine {
    &self.engine
  }

  /// Wraps a push from the engine into an envelope with a fresh `msg_id`.
  pub(crate) fn stamp(&mut self, me: &NodeId, push: Push) -> Envelope {
    let msg_id = self.next_msg_id;
    self.next_msg_id += 1;
    Envelope {
      src: me.clone(),
      dest: push.to,
      body: Body {
        msg_id: Some(msg_id),
        in_reply_to: None,
        payload: push.payload,
      },
    }
  }
}

/// A cluster member taking part in the broadcast.
///
/// The protocol logic lives in [`handle`](BroadcastNode::handle) and
/// [`tick`](BroadcastNode::tick), which return the envelopes to send instead
/// of sending them, so they can be driven without a runtime. As an [`Actor`],
/// the node delivers those envelopes to its outbox and keeps the gossip ticks
/// coming.
pub struct BroadcastNode {
  pub(crate) state: NodeState,
  pub(crate) config: NodeConfig,
  pub(crate) scheduler: GossipScheduler,
  outbox: LocalRef<Envelope>,
  pub(crate) pending_tick: Option<Duration>,
}
impl BroadcastNode {
  pub fn new(config: NodeConfig, outbox: LocalRef<Envelope>) -> BroadcastNode {
    Self::with_rng(config, outbox, SmallRng::from_entropy())
  }

  /// Like [`new`](BroadcastNode::new), with gossip targets drawn from `rng`.
  pub fn with_rng(
    config: NodeConfig,
    outbox: LocalRef<Envelope>,
    rng: SmallRng,
  ) -> BroadcastNode {
    let engine =
      PropagationEngine::with_rng(config.selector, config.gossip_fanout, rng);
    BroadcastNode {
      state: NodeState::new(engine),
      scheduler: GossipScheduler::new(&config),
      config: config,
      outbox: outbox,
      pending_tick: None,
    }
  }

  /// Starts a node as an actor. It sends everything it produces to `outbox`.
  pub fn spawn(
    config: NodeConfig,
    outbox: LocalRef<Envelope>,
  ) -> ActorHandle<NodeMsg> {
    spawn(BroadcastNode::new(config, outbox), "broadcast-node".to_string())
  }

  pub fn state(&self) -> &NodeState {
    &self.state
  }

  pub fn config(&self) -> &NodeConfig {
    &self.config
  }

  pub fn scheduler(&self) -> &GossipScheduler {
    &self.scheduler
  }

  /// One anti-entropy round. Empty unless the scheduler is running, that is
  /// before init or with gossip disabled.
  pub fn tick(&mut self) -> Vec<Envelope> {
    if self.scheduler.state() != SchedulerState::Running {
      return vec![];
    }
    let me = match &self.state.id {
      Some(me) => me.clone(),
      None => return vec![],
    };
    let pushes = self.state.engine.gossip_round();
    if !pushes.is_empty() {
      debug!(
        node = %me,
        values = self.state.engine.store().len(),
        targets = pushes.len(),
        "gossip round"
      );
    }
    self.stamp_all(&me, pushes)
  }

  pub(crate) fn stamp_all(
    &mut self,
    me: &NodeId,
    pushes: Vec<Push>,
  ) -> Vec<Envelope> {
    let mut out = Vec::with_capacity(pushes.len());
    for push in pushes {
      out.push(self.state.stamp(me, push));
    }
    out
  }

  fn deliver(&self, envelopes: Vec<Envelope>) {
    for envelope in envelopes {
      let dest = envelope.dest.clone();
      if !self.outbox.send(envelope) {
        warn!(dest = %dest, "outbox closed, message lost");
      }
    }
  }
}

#[async_trait]
impl Actor<NodeMsg> for BroadcastNode {
  async fn recv(&mut self, ctx: &ActorContext<NodeMsg>, msg: NodeMsg) {
    match msg {
      NodeMsg::Inbound(envelope) => {
        let out = self.handle(envelope);
        self.deliver(out);
        if let Some(warmup) = self.pending_tick.take() {
          info!(node = ?self.state.id, ?warmup, "gossip scheduler running");
          ctx.schedule_local_msg(warmup, NodeMsg::GossipTick);
        }
      }
      NodeMsg::GossipTick => {
        let out = self.tick();
        self.deliver(out);
        if let Some(interval) = self.scheduler.tick() {
          ctx.schedule_local_msg(interval, NodeMsg::GossipTick);
        }
      }
    }
  }

  async fn post_stop(&mut self, _: &ActorContext<NodeMsg>) {
    info!(
      node = ?self.state.id,
      values = self.state.engine.store().len(),
      "node stopped"
    );
  }
}
