use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DISPATCHER_ROLE;
use crate::Error;
use crate::Result;

/// File-backed coordination service shared by every participant
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CoordinationConfig {
    /// Shared HA storage: leader leases and persisted job records
    #[serde(default = "default_ha_dir")]
    pub ha_dir: PathBuf,

    /// Leadership role coordinators contend for
    #[serde(default = "default_role")]
    pub role: String,

    /// A lease not renewed within this window is considered expired
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    #[serde(default = "default_renew_interval_ms")]
    pub renew_interval_ms: u64,

    /// Pause between writing a lease and confirming it was not overwritten
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// How often leader retrieval re-reads the lease
    #[serde(default = "default_retrieval_poll_interval_ms")]
    pub retrieval_poll_interval_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            ha_dir: default_ha_dir(),
            role: default_role(),
            lease_ttl_ms: default_lease_ttl_ms(),
            renew_interval_ms: default_renew_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retrieval_poll_interval_ms: default_retrieval_poll_interval_ms(),
        }
    }
}

impl CoordinationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ha_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("ha_dir cannot be empty".into()));
        }

        if self.role.trim().is_empty() {
            return Err(Error::InvalidConfig("role cannot be empty".into()));
        }

        if self.renew_interval_ms == 0 || self.retrieval_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "renew_interval_ms and retrieval_poll_interval_ms must be positive".into(),
            ));
        }

        if self.lease_ttl_ms <= self.renew_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "lease_ttl_ms({}) must be greater than renew_interval_ms({})",
                self.lease_ttl_ms, self.renew_interval_ms
            )));
        }

        Ok(())
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    pub fn renew_interval(&self) -> Duration {
        Duration::from_millis(self.renew_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retrieval_poll_interval(&self) -> Duration {
        Duration::from_millis(self.retrieval_poll_interval_ms)
    }
}

fn default_ha_dir() -> PathBuf {
    std::env::temp_dir().join("failover-harness").join("ha")
}
fn default_role() -> String {
    DISPATCHER_ROLE.to_string()
}
fn default_lease_ttl_ms() -> u64 {
    1500
}
fn default_renew_interval_ms() -> u64 {
    300
}
fn default_settle_delay_ms() -> u64 {
    100
}
fn default_retrieval_poll_interval_ms() -> u64 {
    100
}
