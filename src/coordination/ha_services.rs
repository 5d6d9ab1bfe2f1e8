use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use super::JobGraphStore;
use super::LeaderElection;
use crate::config::CoordinationConfig;
use crate::constants::JOBS_DIR;
use crate::constants::LEADER_DIR;
use crate::constants::LEASE_SUFFIX;
use crate::discovery::FileLeaderRetrieval;
use crate::utils::file_io;
use crate::Result;

/// Entry point to the coordination state of one HA directory.
#[derive(Debug, Clone)]
pub struct HighAvailabilityServices {
    config: CoordinationConfig,
}

impl HighAvailabilityServices {
    pub fn new(config: CoordinationConfig) -> Self {
        Self { config }
    }

    /// Creates the directory layout and returns the services over it.
    pub async fn create(config: CoordinationConfig) -> Result<Self> {
        let services = Self::new(config);
        file_io::create_dir_if_not_exist(&services.ha_dir().join(LEADER_DIR)).await?;
        file_io::create_dir_if_not_exist(&services.ha_dir().join(JOBS_DIR)).await?;
        Ok(services)
    }

    pub fn ha_dir(&self) -> &Path {
        &self.config.ha_dir
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    pub fn lease_path(&self) -> PathBuf {
        self.ha_dir()
            .join(LEADER_DIR)
            .join(format!("{}.{LEASE_SUFFIX}", self.config.role))
    }

    pub fn leader_election(
        &self,
        participant_id: u32,
        address: impl Into<String>,
    ) -> LeaderElection {
        LeaderElection::new(self.lease_path(), &self.config, participant_id, address)
    }

    /// A new, not yet started, retrieval service for the configured role.
    pub fn leader_retrieval(&self) -> FileLeaderRetrieval {
        FileLeaderRetrieval::new(
            self.lease_path(),
            self.config.lease_ttl(),
            self.config.retrieval_poll_interval(),
        )
    }

    pub fn job_store(&self) -> JobGraphStore {
        JobGraphStore::new(self.ha_dir().join(JOBS_DIR))
    }

    /// Deletes every lease and job record of this HA directory.
    pub async fn close_and_cleanup_all_data(&self) -> Result<()> {
        file_io::remove_dir_if_exists(self.ha_dir()).await?;
        info!("removed HA data under {}", self.ha_dir().display());
        Ok(())
    }
}
