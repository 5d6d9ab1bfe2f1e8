use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Settings of a single coordinator participant process
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Participant identity, overwritten per spawned process
    #[serde(default)]
    pub node_id: u32,

    /// 0 picks an ephemeral port; the bound address is published in the lease
    #[serde(default)]
    pub listen_port: u16,

    /// A worker that has not polled for this long is considered disconnected
    #[serde(default = "default_worker_timeout_ms")]
    pub worker_timeout_ms: u64,

    /// Base delay between leadership campaign attempts (jittered)
    #[serde(default = "default_campaign_retry_ms")]
    pub campaign_retry_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            listen_port: 0,
            worker_timeout_ms: default_worker_timeout_ms(),
            campaign_retry_ms: default_campaign_retry_ms(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_timeout_ms == 0 {
            return Err(Error::InvalidConfig("worker_timeout_ms cannot be 0".into()));
        }
        if self.campaign_retry_ms == 0 {
            return Err(Error::InvalidConfig("campaign_retry_ms cannot be 0".into()));
        }
        Ok(())
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn campaign_retry(&self) -> Duration {
        Duration::from_millis(self.campaign_retry_ms)
    }
}

fn default_worker_timeout_ms() -> u64 {
    3000
}
fn default_campaign_retry_ms() -> u64 {
    200
}
