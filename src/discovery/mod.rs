//! Leader discovery for clients of the cluster.
//!
//! A [`LeaderRetrievalService`] watches the coordination service and publishes
//! the active leader on a watch channel. Only the latest value is retained, so
//! a listener that falls behind a flapping leadership sees the most recent
//! leader and never a queue of stale ones.

mod file_leader_retrieval;
mod leader_listener;

pub use file_leader_retrieval::*;
pub use leader_listener::*;

#[cfg(test)]
mod file_leader_retrieval_test;
#[cfg(test)]
mod leader_listener_test;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::coordination::LeaderRecord;
use crate::Result;

/// Address and session of the active leader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderInfo {
    pub participant_id: u32,
    pub address: String,
    pub session_id: String,
}

impl From<LeaderRecord> for LeaderInfo {
    fn from(record: LeaderRecord) -> Self {
        Self {
            participant_id: record.participant_id,
            address: record.address,
            session_id: record.session_id,
        }
    }
}

#[cfg_attr(test, automock)]
pub trait LeaderRetrievalService: Send + Sync + 'static {
    /// Starts watching (if not already) and returns a new listener.
    fn start(&self) -> Result<LeaderListener>;

    /// Stops watching; existing listeners keep the last published value.
    fn stop(&self);
}
