//! File-backed coordination service shared by every participant of a run.
//!
//! All state lives under one HA directory:
//! - `leader/<role>.lease` names the current leader of a role
//! - `jobs/<job id>.job` holds submitted jobs for recovery by a new leader
//!
//! Writers always go through temp file + rename, readers never observe a
//! partially written record.

mod ha_services;
mod job_store;
mod leader_election;

pub use ha_services::*;
pub use job_store::*;
pub use leader_election::*;

#[cfg(test)]
mod ha_services_test;
#[cfg(test)]
mod leader_election_test;
