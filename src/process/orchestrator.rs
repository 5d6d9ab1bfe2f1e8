use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tracing::error;
use tracing::info;

use super::participant::LogBuffer;
use super::ParticipantLauncher;
use super::ParticipantProcess;
use crate::config::HarnessConfig;
use crate::constants::PROCESS_LOG_CAPACITY;
use crate::utils::file_io;
use crate::Error;
use crate::Result;

/// Spawns, terminates and inspects coordinator processes.
pub struct ProcessOrchestrator {
    launcher: Arc<dyn ParticipantLauncher>,
    snapshot_dir: PathBuf,
}

impl ProcessOrchestrator {
    /// `snapshot_dir` receives one TOML config snapshot per participant.
    pub fn new(
        launcher: Arc<dyn ParticipantLauncher>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Starts the participant `identity` with a snapshot of `config`.
    ///
    /// # Errors
    /// [`Error::LaunchFailure`] when the OS process cannot be created.
    pub async fn spawn(
        &self,
        identity: u32,
        config: &HarnessConfig,
    ) -> Result<ParticipantProcess> {
        let snapshot = config.for_participant(identity);
        file_io::create_dir_if_not_exist(&self.snapshot_dir).await?;
        let config_path = self.snapshot_dir.join(format!("participant-{identity}.toml"));
        file_io::write_atomically(&config_path, snapshot.to_toml()?.as_bytes()).await?;

        let mut command = self.launcher.command(identity, &config_path, &snapshot)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|source| Error::LaunchFailure { identity, source })?;

        let log = LogBuffer::new(PROCESS_LOG_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(log.capture(identity, "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(log.capture(identity, "stderr", stderr));
        }

        let process = ParticipantProcess::new(identity, snapshot, config_path, child, log, readers);
        info!(identity, pid = ?process.pid(), "participant started");
        Ok(process)
    }

    /// SIGKILL + reap; a process that already exited is left alone.
    pub async fn kill(
        &self,
        process: &mut ParticipantProcess,
    ) -> Result<()> {
        process.kill().await
    }

    pub fn is_running(
        &self,
        process: &mut ParticipantProcess,
    ) -> bool {
        process.is_running()
    }

    pub fn capture_log(
        &self,
        process: &ParticipantProcess,
    ) -> Vec<String> {
        process.log_lines()
    }

    /// Emits the captured output of `process` for post-mortem diagnosis.
    pub fn print_log(
        &self,
        process: &ParticipantProcess,
    ) {
        let lines = self.capture_log(process);
        error!(
            identity = process.identity(),
            "---- output of coordinator {} ({} lines) ----",
            process.identity(),
            lines.len()
        );
        for line in lines {
            error!(identity = process.identity(), "{}", line);
        }
    }
}
