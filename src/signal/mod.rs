//! Cross-process signaling through content-free markers.
//!
//! Independent OS processes cannot share in-memory synchronization, so the
//! workload and the test driver meet at [`SignalStore`]. Markers are
//! append-only: once observed, a marker stays for the rest of the scenario.

mod file_signal_store;
pub use file_signal_store::*;

#[cfg(test)]
mod file_signal_store_test;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::constants::FINISH_MARKER_PREFIX;
use crate::constants::READY_MARKER_PREFIX;
use crate::utils::deadline::Deadline;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignalStore: Send + Sync + 'static {
    /// Creates the marker `name`; repeated or concurrent calls are no-ops.
    async fn signal(
        &self,
        name: &str,
    ) -> Result<()>;

    async fn exists(
        &self,
        name: &str,
    ) -> Result<bool>;

    /// Number of distinct markers whose name starts with `prefix`.
    async fn count(
        &self,
        prefix: &str,
    ) -> Result<usize>;

    /// Blocks until at least `count` distinct markers share `prefix`.
    ///
    /// # Errors
    /// [`crate::Error::Timeout`] naming the prefix once `deadline` passes.
    async fn await_markers(
        &self,
        prefix: &str,
        count: usize,
        interval: Duration,
        deadline: Deadline,
    ) -> Result<usize>;
}

/// Per-subtask readiness marker, e.g. `ready_3`.
pub fn ready_marker(index: u32) -> String {
    format!("{READY_MARKER_PREFIX}{index}")
}

/// Per-subtask completion marker, e.g. `finish_0`.
pub fn finish_marker(index: u32) -> String {
    format!("{FINISH_MARKER_PREFIX}{index}")
}
