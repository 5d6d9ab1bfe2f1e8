use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ScenarioPhase;
use crate::cluster::WorkerRuntime;
use crate::config::HarnessConfig;
use crate::constants::COORDINATE_DIR_NAME;
use crate::constants::HA_DIR_NAME;
use crate::constants::SNAPSHOT_DIR_NAME;
use crate::coordination::HighAvailabilityServices;
use crate::discovery::FileLeaderRetrieval;
use crate::discovery::LeaderListener;
use crate::discovery::LeaderRetrievalService;
use crate::process::ParticipantProcess;
use crate::process::ProcessOrchestrator;
use crate::signal::FileSignalStore;
use crate::utils::file_io;
use crate::Error;
use crate::Result;

/// Everything a scenario has acquired so far.
///
/// Resources are added as phases advance; [`ScenarioState::teardown`] releases
/// whatever exists, regardless of where the scenario stopped.
pub(crate) struct ScenarioState {
    pub(crate) phase: ScenarioPhase,
    pub(crate) run_dir: PathBuf,
    pub(crate) ha: HighAvailabilityServices,
    pub(crate) signals: Arc<FileSignalStore>,
    pub(crate) orchestrator: ProcessOrchestrator,
    pub(crate) coordinators: Vec<ParticipantProcess>,
    pub(crate) workers: Vec<WorkerRuntime>,
    pub(crate) retrieval: Option<FileLeaderRetrieval>,
    pub(crate) listener: Option<LeaderListener>,
    pub(crate) workload_rx: Option<oneshot::Receiver<Result<()>>>,
    /// Result delivered before the finish marker was observed
    pub(crate) workload_result: Option<Result<()>>,
    pub(crate) workload: Option<JoinHandle<()>>,
}

impl ScenarioState {
    /// Lays out `run_dir` without touching the filesystem yet.
    pub(crate) fn new(
        run_dir: PathBuf,
        ha: HighAvailabilityServices,
        orchestrator: ProcessOrchestrator,
    ) -> Self {
        let signals = Arc::new(FileSignalStore::new(Self::coordinate_dir_of(&run_dir)));
        Self {
            phase: ScenarioPhase::Init,
            run_dir,
            ha,
            signals,
            orchestrator,
            coordinators: Vec::new(),
            workers: Vec::new(),
            retrieval: None,
            listener: None,
            workload_rx: None,
            workload_result: None,
            workload: None,
        }
    }

    pub(crate) fn ha_dir_of(run_dir: &Path) -> PathBuf {
        run_dir.join(HA_DIR_NAME)
    }

    pub(crate) fn coordinate_dir_of(run_dir: &Path) -> PathBuf {
        run_dir.join(COORDINATE_DIR_NAME)
    }

    pub(crate) fn snapshot_dir_of(run_dir: &Path) -> PathBuf {
        run_dir.join(SNAPSHOT_DIR_NAME)
    }

    pub(crate) fn coordinate_dir(&self) -> &Path {
        self.signals.dir()
    }

    pub(crate) fn listener(&self) -> Result<LeaderListener> {
        self.listener
            .clone()
            .ok_or_else(|| Error::Fatal("leader discovery has not been started".to_string()))
    }

    /// Moves to `target`, which must be the successor of the current phase.
    pub(crate) fn advance(
        &mut self,
        target: ScenarioPhase,
    ) -> Result<()> {
        if !self.phase.can_advance_to(target) {
            return Err(Error::Fatal(format!(
                "illegal scenario transition {} -> {}",
                self.phase, target
            )));
        }
        info!("scenario phase {} -> {}", self.phase, target);
        self.phase = target;
        Ok(())
    }

    /// Starts the coordinator with the lowest identity not used so far.
    ///
    /// Identities are drawn from `0..cluster.num_coordinators`; a killed
    /// coordinator keeps its identity, so every start consumes one.
    pub(crate) async fn spawn_coordinator(
        &mut self,
        config: &HarnessConfig,
    ) -> Result<u32> {
        let num_coordinators = config.cluster.num_coordinators;
        let identity = (0..num_coordinators)
            .find(|identity| self.coordinators.iter().all(|process| process.identity() != *identity))
            .ok_or_else(|| {
                Error::Fatal(format!(
                    "all {num_coordinators} coordinator identities are already in use"
                ))
            })?;

        let process = self.orchestrator.spawn(identity, config).await?;
        self.coordinators.push(process);
        Ok(identity)
    }

    /// Prints the captured output of every coordinator ever started.
    pub(crate) fn print_coordinator_logs(&self) {
        for process in &self.coordinators {
            self.orchestrator.print_log(process);
        }
    }

    /// Releases every acquired resource.
    ///
    /// Each step is attempted even when an earlier one failed; failures are
    /// reported as [`Error::CleanupFailure`] and only logged.
    pub(crate) async fn teardown(&mut self) {
        let mut failures = Vec::new();

        for mut worker in self.workers.drain(..) {
            if let Err(e) = worker.close().await {
                failures.push(Error::CleanupFailure(format!(
                    "closing worker {}: {e}",
                    worker.worker_id()
                )));
            }
        }

        if let Some(retrieval) = self.retrieval.take() {
            retrieval.stop();
        }
        self.listener = None;

        for process in self.coordinators.iter_mut() {
            if let Err(e) = self.orchestrator.kill(process).await {
                failures.push(Error::CleanupFailure(format!(
                    "killing coordinator {}: {e}",
                    process.identity()
                )));
            }
        }

        if let Some(workload) = self.workload.take() {
            workload.abort();
        }
        self.workload_rx = None;
        self.workload_result = None;

        if let Err(e) = self.ha.close_and_cleanup_all_data().await {
            failures.push(Error::CleanupFailure(format!("removing HA data: {e}")));
        }
        if let Err(e) = file_io::remove_dir_if_exists(self.coordinate_dir()).await {
            failures.push(Error::CleanupFailure(format!(
                "removing coordination directory: {e}"
            )));
        }
        if let Err(e) = file_io::remove_dir_if_exists(&self.run_dir).await {
            failures.push(Error::CleanupFailure(format!("removing run directory: {e}")));
        }

        for failure in &failures {
            warn!("{}", failure);
        }
        if let Err(e) = self.advance(ScenarioPhase::TornDown) {
            error!("{}", e);
        }
    }
}
