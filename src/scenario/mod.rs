//! End-to-end leader failover scenario.
//!
//! ## Phases
//! `Init → ClusterUp → WorkloadSubmitted → WorkersReady → LeaderKilled →
//! ReplacementUp → WorkloadReleased → WorkloadFinished → Verified → TornDown`
//!
//! The driver and the workload task only meet through markers in the
//! coordination directory and the one-shot workload result. Every wait is
//! bounded by a single scenario [`Deadline`](crate::utils::deadline::Deadline),
//! and teardown runs no matter which phase failed.

mod phase;
mod recovery_scenario;
mod state;

pub use phase::*;
pub use recovery_scenario::*;
pub(crate) use state::*;
