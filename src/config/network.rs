use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// RPC timeouts between harness, workers and coordinators
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Worker task-poll cadence, which doubles as its liveness heartbeat
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    /// Largest accepted frame on the wire
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "connect_timeout_ms and request_timeout_ms must be positive".into(),
            ));
        }
        if self.worker_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("worker_poll_interval_ms cannot be 0".into()));
        }
        if self.max_frame_bytes < 1024 {
            return Err(Error::InvalidConfig(format!(
                "max_frame_bytes({}) is too small",
                self.max_frame_bytes
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    500
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_worker_poll_interval_ms() -> u64 {
    50
}
fn default_max_frame_bytes() -> usize {
    4 * 1024 * 1024
}
