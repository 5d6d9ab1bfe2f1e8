//! Configuration management for the failover harness.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`FAILOVER__SECTION__KEY`)
//! - Component-wise validation
//!
//! Coordinator processes receive their configuration snapshot through the same
//! mechanism: the orchestrator serializes the snapshot to TOML and points
//! `CONFIG_PATH` at it.
mod cluster;
mod coordination;
mod coordinator;
mod network;
mod scenario;
mod workload;
pub use cluster::*;
pub use coordination::*;
pub use coordinator::*;
pub use network::*;
pub use scenario::*;
pub use workload::*;


use std::env;
use std::fmt::Debug;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::Error;
use crate::Result;

/// Main configuration container for every harness component
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct HarnessConfig {
    /// Cluster topology: coordinators, workers and slots
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Settings of one coordinator participant
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// File-backed coordination service (leader lease, job store)
    #[serde(default)]
    pub coordination: CoordinationConfig,
    /// RPC timeouts and polling cadence
    #[serde(default)]
    pub network: NetworkConfig,
    /// The paced verification job
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Overall test deadline and polling intervals
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl Debug for HarnessConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("cluster", &self.cluster)
            .field("coordinator", &self.coordinator.node_id)
            .field("workload", &self.workload)
            .finish()
    }
}

impl HarnessConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/failover.toml");
    /// std::env::set_var("FAILOVER__WORKLOAD__PARALLELISM", "4");
    /// let cfg = HarnessConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and the cross-section topology rules.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.coordinator.validate()?;
        self.coordination.validate()?;
        self.network.validate()?;
        self.workload.validate()?;
        self.scenario.validate()?;

        if self.cluster.total_slots() != self.workload.parallelism {
            return Err(Error::InvalidConfig(format!(
                "num_workers({}) * slots_per_worker({}) must equal workload parallelism({})",
                self.cluster.num_workers, self.cluster.slots_per_worker, self.workload.parallelism
            )));
        }
        Ok(self)
    }

    /// Snapshot handed to the coordinator participant with the given identity.
    pub fn for_participant(
        &self,
        identity: u32,
    ) -> Self {
        let mut snapshot = self.clone();
        snapshot.coordinator.node_id = identity;
        snapshot
    }

    /// Serializes the configuration so a participant can load it via `CONFIG_PATH`.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
    }
}

/// Ensures directory path is valid and writable
pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} path cannot be empty"
        ))));
    }

    #[cfg(not(test))]
    {
        use std::fs;
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                Error::Config(ConfigError::Message(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                )))
            })?;
        }

        let test_file = path.join(".permission_test");
        fs::write(&test_file, b"test").map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "No write permission in {} directory {}: {}",
                name,
                path.display(),
                e
            )))
        })?;
        fs::remove_file(&test_file).ok();
    }

    Ok(())
}
