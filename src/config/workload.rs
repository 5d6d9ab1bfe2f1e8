use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters of the paced sum job used as the recovery victim
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// The job sums the sequence 1..=num_elements
    #[serde(default = "default_num_elements")]
    pub num_elements: u64,

    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    /// Per-record pause of the map stage until `proceed` appears
    #[serde(default = "default_pace_delay_ms")]
    pub pace_delay_ms: u64,

    /// How often the workload task asks the leader for the job status
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Fixed-delay restart strategy: how many times a failed job is retried
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,

    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_elements: default_num_elements(),
            parallelism: default_parallelism(),
            pace_delay_ms: default_pace_delay_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            max_restart_attempts: default_max_restart_attempts(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_elements == 0 {
            return Err(Error::InvalidConfig("num_elements cannot be 0".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::InvalidConfig("parallelism cannot be 0".into()));
        }
        if self
            .num_elements
            .checked_add(1)
            .and_then(|next| self.num_elements.checked_mul(next))
            .is_none()
        {
            return Err(Error::InvalidConfig(format!(
                "num_elements({}) overflows the expected sum",
                self.num_elements
            )));
        }
        if self.status_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("status_poll_interval_ms cannot be 0".into()));
        }
        Ok(())
    }

    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}

fn default_num_elements() -> u64 {
    100_000
}
fn default_parallelism() -> u32 {
    4
}
fn default_pace_delay_ms() -> u64 {
    100
}
fn default_status_poll_interval_ms() -> u64 {
    200
}
fn default_max_restart_attempts() -> u32 {
    1
}
fn default_restart_delay_ms() -> u64 {
    0
}
