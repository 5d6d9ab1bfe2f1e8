use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::validate_directory;
use crate::Error;
use crate::Result;

/// Topology of the cluster brought up for one scenario
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Coordinator participants the scenario may start (initial + replacements)
    #[serde(default = "default_num_coordinators")]
    pub num_coordinators: u32,

    #[serde(default = "default_num_workers")]
    pub num_workers: u32,

    #[serde(default = "default_slots_per_worker")]
    pub slots_per_worker: u32,

    /// Interface coordinators bind their RPC listener to
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    /// Parent of every per-scenario run directory
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Coordinator executable; resolved next to the current executable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator_binary: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            num_coordinators: default_num_coordinators(),
            num_workers: default_num_workers(),
            slots_per_worker: default_slots_per_worker(),
            listen_host: default_listen_host(),
            work_dir: default_work_dir(),
            coordinator_binary: None,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        // one initial leader plus at least one replacement
        if self.num_coordinators < 2 {
            return Err(Error::InvalidConfig(format!(
                "num_coordinators must be at least 2, got {}",
                self.num_coordinators
            )));
        }

        if self.num_workers == 0 {
            return Err(Error::InvalidConfig("num_workers cannot be 0".into()));
        }

        if self.slots_per_worker == 0 {
            return Err(Error::InvalidConfig("slots_per_worker cannot be 0".into()));
        }

        if self.listen_host.trim().is_empty() {
            return Err(Error::InvalidConfig("listen_host cannot be empty".into()));
        }

        validate_directory(&self.work_dir, "work_dir")?;

        Ok(())
    }

    pub fn total_slots(&self) -> u32 {
        self.num_workers * self.slots_per_worker
    }
}

fn default_num_coordinators() -> u32 {
    2
}
fn default_num_workers() -> u32 {
    2
}
fn default_slots_per_worker() -> u32 {
    2
}
fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}
fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("failover-harness")
}
