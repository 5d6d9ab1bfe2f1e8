//! Failure-injection harness for leader failover.
//!
//! Starts a small cluster (coordinator processes plus in-process workers),
//! submits a paced verification job, kills the leading coordinator while the
//! job is mid-flight and checks that the job recovers under a new leader.
//!
//! ## Layout
//! - [`scenario`]: the end-to-end driver, [`RecoveryScenario`]
//! - [`process`]: coordinator OS processes and their captured output
//! - [`discovery`]: following the current leader
//! - [`signal`]: marker files shared by the driver and the workload
//! - [`workload`]: the paced sum job and the task that follows it
//! - [`cluster`] / [`coordination`]: the coordinator, workers and their
//!   file-backed HA state

pub mod cluster;
pub mod config;
pub mod constants;
pub mod coordination;
pub mod discovery;
mod errors;
pub mod process;
pub mod scenario;
pub mod signal;
pub mod utils;
pub mod workload;

pub use config::HarnessConfig;
pub use errors::*;
pub use scenario::RecoveryScenario;
pub use scenario::ScenarioPhase;
pub use utils::deadline::Deadline;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
