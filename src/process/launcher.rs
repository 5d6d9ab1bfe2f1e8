use std::env;
use std::path::Path;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use tokio::process::Command;

use crate::config::HarnessConfig;
use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::Error;
use crate::Result;

/// Name of the coordinator executable built from this crate
pub const COORDINATOR_BINARY_NAME: &str = "failover-coordinator";

/// Decides which command runs a participant identity.
#[cfg_attr(test, automock)]
pub trait ParticipantLauncher: Send + Sync + 'static {
    /// Builds the command for `identity`, whose config snapshot lives at
    /// `config_path`. Stdio and drop behaviour are set by the orchestrator.
    fn command(
        &self,
        identity: u32,
        config_path: &Path,
        config: &HarnessConfig,
    ) -> Result<Command>;
}

/// Launches the `failover-coordinator` binary.
#[derive(Debug, Clone)]
pub struct CoordinatorLauncher {
    binary: PathBuf,
}

impl CoordinatorLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Uses `cluster.coordinator_binary`, else looks next to the running
    /// executable and its parent (test binaries live in `target/*/deps`).
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        if let Some(binary) = &config.cluster.coordinator_binary {
            return Ok(Self::new(binary));
        }

        let current = env::current_exe()?;
        let candidates = current
            .ancestors()
            .skip(1)
            .take(2)
            .map(|dir| dir.join(COORDINATOR_BINARY_NAME));
        for candidate in candidates {
            if candidate.is_file() {
                return Ok(Self::new(candidate));
            }
        }

        Err(Error::InvalidConfig(format!(
            "cannot locate {COORDINATOR_BINARY_NAME} near {}; set cluster.coordinator_binary",
            current.display()
        )))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl ParticipantLauncher for CoordinatorLauncher {
    fn command(
        &self,
        _identity: u32,
        config_path: &Path,
        _config: &HarnessConfig,
    ) -> Result<Command> {
        let mut command = Command::new(&self.binary);
        // the snapshot is authoritative, inherited overrides would shadow it
        let override_prefix = format!("{ENV_PREFIX}__");
        for (key, _) in env::vars_os() {
            if key.to_str().is_some_and(|k| k.starts_with(&override_prefix)) {
                command.env_remove(key);
            }
        }
        command.env(CONFIG_PATH_ENV, config_path);
        Ok(command)
    }
}
