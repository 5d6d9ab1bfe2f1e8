use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Deadline and polling cadence of the recovery scenario
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScenarioConfig {
    /// Overall test deadline, derived once when the scenario starts
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// Cluster overview poll interval while waiting for workers
    #[serde(default = "default_overview_poll_interval_ms")]
    pub overview_poll_interval_ms: u64,

    #[serde(default = "default_marker_poll_interval_ms")]
    pub marker_poll_interval_ms: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: default_test_timeout_secs(),
            overview_poll_interval_ms: default_overview_poll_interval_ms(),
            marker_poll_interval_ms: default_marker_poll_interval_ms(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.test_timeout_secs == 0 {
            return Err(Error::InvalidConfig("test_timeout_secs cannot be 0".into()));
        }
        if self.overview_poll_interval_ms == 0 || self.marker_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn overview_poll_interval(&self) -> Duration {
        Duration::from_millis(self.overview_poll_interval_ms)
    }

    pub fn marker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.marker_poll_interval_ms)
    }
}

fn default_test_timeout_secs() -> u64 {
    300
}
fn default_overview_poll_interval_ms() -> u64 {
    50
}
fn default_marker_poll_interval_ms() -> u64 {
    100
}
