//! Tools for testing broadcast clusters without real processes: a simulated
//! network with configurable message loss, delay and partitions.

mod failure_config;
mod sim;

#[rustfmt::skip]
pub use {
  failure_config::FailureConfig,
  failure_config::FailureConfigMap,
  sim::SimCluster,
  sim::SimStats,
};
