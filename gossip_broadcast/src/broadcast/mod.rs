//! The broadcast protocol.
//!
//! Every value a client hands to any node must eventually be readable from
//! every node, including across temporary network partitions. A
//! [`BroadcastNode`] achieves this in two ways:
//!
//! - **Eager push.** A value seen for the first time is forwarded at once to
//!   each neighbor that is not known to have it, tracked by the
//!   [`SentTracker`].
//! - **Anti-entropy.** Every [`gossip_interval`](NodeConfig::gossip_interval),
//!   the whole [`ValueStore`] is sent to one neighbor chosen by the
//!   [`GossipSelector`]. The receiver merges it, and anything new to it is
//!   pushed eagerly onward.
//!
//! Neighbors come from the most recent `topology` message; see [`Topology`].
//! The node acts on nothing but `init` until initialized.
//!
//! [`serve`] runs a node over stdin and stdout. For a cluster of nodes inside
//! one process, see [`testkit::SimCluster`](crate::testkit::SimCluster).

mod config;
mod dispatcher;
mod engine;
mod node;
mod scheduler;
mod sent_tracker;
mod service;
mod topology;
mod value_store;

#[rustfmt::skip]
pub use {
  config::AckPolicy,
  config::GossipSelector,
  config::NodeConfig,
  engine::PropagationEngine,
  engine::Push,
  node::BroadcastNode,
  node::NodeMsg,
  node::NodeState,
  scheduler::GossipScheduler,
  scheduler::SchedulerState,
  sent_tracker::SentTracker,
  service::serve,
  service::serve_io,
  topology::Neighbors,
  topology::Topology,
  value_store::ValueStore,
};
