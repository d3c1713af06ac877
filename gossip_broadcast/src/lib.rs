//! A node for eventually-consistent broadcast over an unreliable network.
//!
//! Nodes exchange newline-delimited JSON envelopes. Values handed to any node
//! are pushed eagerly to its neighbors and repaired by periodic anti-entropy
//! gossip, so every node ends up able to read every value even after messages
//! are lost or the network partitions for a while.
//!
//! [`core`] holds the actor runtime and the wire format, [`broadcast`] the
//! protocol, and [`testkit`] an in-process simulated cluster.

pub mod broadcast;
pub mod core;
pub mod testkit;
