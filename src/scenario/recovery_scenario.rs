use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::ScenarioPhase;
use super::ScenarioState;
use crate::cluster::ClusterClient;
use crate::cluster::RpcClusterClient;
use crate::cluster::WorkerRuntime;
use crate::config::HarnessConfig;
use crate::constants::FINISH_MARKER_PREFIX;
use crate::constants::PROCEED_MARKER;
use crate::constants::READY_MARKER_PREFIX;
use crate::constants::RUN_DIR_PREFIX;
use crate::coordination::HighAvailabilityServices;
use crate::discovery::LeaderRetrievalService;
use crate::process::CoordinatorLauncher;
use crate::process::ParticipantLauncher;
use crate::process::ProcessOrchestrator;
use crate::signal::SignalStore;
use crate::utils::deadline::Deadline;
use crate::utils::file_io;
use crate::utils::poller::poll_until;
use crate::workload::PacedSumExecutor;
use crate::workload::WorkloadHarness;
use crate::Error;
use crate::Result;

/// Kills the leading coordinator while a job is mid-flight and checks that
/// the job still completes with a correct result under a new leader.
///
/// # Usage
/// ```ignore
/// let config = HarnessConfig::new()?.validate()?;
/// RecoveryScenario::new(config)?.run().await?;
/// ```
pub struct RecoveryScenario {
    config: HarnessConfig,
    launcher: Arc<dyn ParticipantLauncher>,
}

impl RecoveryScenario {
    /// Scenario running the `failover-coordinator` binary for every coordinator.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let launcher = CoordinatorLauncher::from_config(&config)?;
        Ok(Self::with_launcher(config, Arc::new(launcher)))
    }

    pub fn with_launcher(
        config: HarnessConfig,
        launcher: Arc<dyn ParticipantLauncher>,
    ) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Drives the scenario to completion and always tears it down.
    ///
    /// # Errors
    /// The first fatal failure: [`Error::LaunchFailure`], [`Error::Timeout`]
    /// naming the stage that overran, or the workload's own failure such as
    /// [`Error::WorkloadAssertionFailure`], unchanged.
    pub async fn run(mut self) -> Result<()> {
        let deadline = Deadline::from_now(self.config.scenario.test_timeout());

        let run_dir = self
            .config
            .cluster
            .work_dir
            .join(format!("{RUN_DIR_PREFIX}{}", nanoid::nanoid!(8)));
        self.config.coordination.ha_dir = ScenarioState::ha_dir_of(&run_dir);

        let ha = HighAvailabilityServices::new(self.config.coordination.clone());
        let orchestrator = ProcessOrchestrator::new(self.launcher.clone(), ScenarioState::snapshot_dir_of(&run_dir));
        let mut state = ScenarioState::new(run_dir, ha, orchestrator);
        info!("recovery scenario starting in {}", state.run_dir.display());

        let result = self.drive(&mut state, deadline).await;
        match &result {
            Ok(()) => info!("recovery scenario passed after {:?}", deadline.elapsed()),
            Err(e) => {
                error!("recovery scenario failed in phase {}: {}", state.phase, e);
                state.print_coordinator_logs();
            }
        }

        state.teardown().await;
        result
    }

    async fn drive(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        self.start_cluster(state, deadline).await?;
        state.advance(ScenarioPhase::ClusterUp)?;

        self.submit_workload(state, deadline)?;
        state.advance(ScenarioPhase::WorkloadSubmitted)?;

        let parallelism = self.config.workload.parallelism as usize;
        state
            .signals
            .await_markers(
                READY_MARKER_PREFIX,
                parallelism,
                self.config.scenario.marker_poll_interval(),
                deadline,
            )
            .await?;
        state.advance(ScenarioPhase::WorkersReady)?;

        self.kill_leader(state).await?;
        state.advance(ScenarioPhase::LeaderKilled)?;

        self.start_replacement(state, deadline).await?;
        state.advance(ScenarioPhase::ReplacementUp)?;

        state.signals.signal(PROCEED_MARKER).await?;
        state.advance(ScenarioPhase::WorkloadReleased)?;

        self.await_finish(state, deadline).await?;
        state.advance(ScenarioPhase::WorkloadFinished)?;

        self.await_workload_result(state, deadline).await?;
        state.advance(ScenarioPhase::Verified)
    }

    /// Directories, the first coordinator, workers and discovery, then waits until
    /// every worker is connected to the elected leader.
    async fn start_cluster(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        file_io::create_dir_if_not_exist(&state.run_dir).await?;
        state.ha = HighAvailabilityServices::create(self.config.coordination.clone()).await?;
        file_io::create_dir_if_not_exist(state.coordinate_dir()).await?;

        state.spawn_coordinator(&self.config).await?;

        let client = RpcClusterClient::new(self.config.network.clone());
        for index in 0..self.config.cluster.num_workers {
            let worker = WorkerRuntime::start(
                format!("worker-{index}"),
                self.config.cluster.slots_per_worker,
                Box::new(state.ha.leader_retrieval()),
                client.clone(),
                Arc::new(PacedSumExecutor::new()),
                self.config.network.worker_poll_interval(),
            )?;
            state.workers.push(worker);
        }

        let retrieval = state.ha.leader_retrieval();
        let mut listener = retrieval.start()?;
        state.retrieval = Some(retrieval);

        let leader = listener.wait_for_leader(deadline).await?;
        info!("coordinator {} leads at {}", leader.participant_id, leader.address);
        state.listener = Some(listener);

        let expected = self.config.cluster.num_workers;
        let overview_listener = state.listener()?;
        let overview = poll_until(
            "all workers to connect",
            || {
                let client = client.clone();
                let mut listener = overview_listener.clone();
                async move {
                    let leader = listener.wait_for_leader(deadline).await?;
                    client.cluster_overview(&leader).await
                }
            },
            |overview| overview.workers_connected >= expected,
            self.config.scenario.overview_poll_interval(),
            deadline,
        )
        .await?;
        debug!(?overview, "cluster is up");
        Ok(())
    }

    /// Spawns the workload task; its result arrives once on `workload_rx`.
    fn submit_workload(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        let harness = WorkloadHarness::new(
            Arc::new(RpcClusterClient::new(self.config.network.clone())),
            state.listener()?,
            WorkloadHarness::job_spec(&self.config.workload, state.coordinate_dir()),
            self.config.workload.status_poll_interval(),
        );

        let (result_tx, result_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let result = harness.run(deadline).await;
            if result_tx.send(result).is_err() {
                debug!("workload result dropped: scenario no longer waiting");
            }
        });
        state.workload_rx = Some(result_rx);
        state.workload = Some(handle);
        Ok(())
    }

    /// Kills whichever coordinator discovery currently names as leader.
    async fn kill_leader(
        &self,
        state: &mut ScenarioState,
    ) -> Result<()> {
        let leader = state
            .listener()?
            .current()
            .ok_or_else(|| Error::Fatal("no leader is known to discovery".to_string()))?;

        let orchestrator = &state.orchestrator;
        let process = state
            .coordinators
            .iter_mut()
            .find(|process| process.identity() == leader.participant_id)
            .ok_or_else(|| {
                Error::Fatal(format!(
                    "leader {} is not a coordinator this scenario started",
                    leader.participant_id
                ))
            })?;
        orchestrator.kill(process).await?;
        info!("killed leading coordinator {}", leader.participant_id);
        Ok(())
    }

    /// No re-submission: the new leader recovers the job on its own.
    async fn start_replacement(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        let identity = state.spawn_coordinator(&self.config).await?;
        debug!("replacement coordinator {} started", identity);

        let listener = state
            .listener
            .as_mut()
            .ok_or_else(|| Error::Fatal("leader discovery has not been started".to_string()))?;
        let leader = listener.wait_for_new_leader(deadline).await?;
        info!(
            "coordinator {} took over at {} (session {})",
            leader.participant_id, leader.address, leader.session_id
        );
        Ok(())
    }

    /// Waits for the finish marker, unless the workload reports first.
    ///
    /// A failed verification never writes the marker, so an early `Err` is
    /// returned as is. An early `Ok` is kept for [`Self::await_workload_result`].
    pub(super) async fn await_finish(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        let signals = state.signals.clone();
        let interval = self.config.scenario.marker_poll_interval();

        let delivered = {
            let result_rx = state
                .workload_rx
                .as_mut()
                .ok_or_else(|| Error::Fatal("workload was never submitted".to_string()))?;
            tokio::select! {
                finished = signals.await_markers(FINISH_MARKER_PREFIX, 1, interval, deadline) => {
                    finished?;
                    None
                }
                delivered = result_rx => Some(delivered),
            }
        };

        let Some(delivered) = delivered else {
            return Ok(());
        };
        state.workload_rx = None;
        report_failure(delivered.unwrap_or_else(|_| Err(aborted())))?;
        state.workload_result = Some(Ok(()));

        signals
            .await_markers(FINISH_MARKER_PREFIX, 1, interval, deadline)
            .await
            .map(|_| ())
    }

    pub(super) async fn await_workload_result(
        &self,
        state: &mut ScenarioState,
        deadline: Deadline,
    ) -> Result<()> {
        if let Some(result) = state.workload_result.take() {
            return result;
        }
        let result_rx = state
            .workload_rx
            .take()
            .ok_or_else(|| Error::Fatal("workload was never submitted".to_string()))?;

        let result = match timeout(deadline.time_left(), result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(aborted()),
            Err(_) => Err(Error::timeout(
                "workload result",
                deadline.elapsed(),
                Some("did not finish in time".to_string()),
            )),
        };
        report_failure(result)
    }
}

fn aborted() -> Error {
    Error::WorkloadAborted("workload task ended without delivering a result".to_string())
}

fn report_failure(result: Result<()>) -> Result<()> {
    if let Err(e) = &result {
        error!("The program encountered a {} : {}", e.kind(), e);
    }
    result
}
