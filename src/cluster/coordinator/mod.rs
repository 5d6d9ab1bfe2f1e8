//! Coordinator participant: campaigns for leadership, schedules jobs while it
//! leads, and exits as soon as it loses the lease.
//!
//! ## Lifecycle
//! 1. Bind the request listener (non-leaders answer `NotLeader`)
//! 2. Campaign for the lease, retrying with jitter
//! 3. Recover running jobs from the job store with a fresh attempt
//! 4. Serve and renew until shutdown or lease loss

mod scheduler;
mod service;

#[cfg(test)]
mod scheduler_test;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::Instant;
use tracing::error;
use tracing::info;
use tracing::warn;

use self::scheduler::Scheduler;
use self::service::serve;
use self::service::CoordinatorState;
use self::service::LeaderContext;
use crate::config::HarnessConfig;
use crate::coordination::HighAvailabilityServices;
use crate::coordination::LeaderElection;
use crate::Result;

pub struct Coordinator {
    config: HarnessConfig,
    shutdown_signal: watch::Receiver<()>,
}

impl Coordinator {
    pub fn new(
        config: HarnessConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let node_id = self.config.coordinator.node_id;
        let listener = TcpListener::bind((
            self.config.cluster.listen_host.as_str(),
            self.config.coordinator.listen_port,
        ))
        .await?;
        let address = listener.local_addr()?.to_string();
        info!(node_id, %address, "coordinator listening");

        let ha = HighAvailabilityServices::create(self.config.coordination.clone()).await?;
        let state = Arc::new(CoordinatorState::default());
        let server = tokio::spawn(serve(
            listener,
            state.clone(),
            self.config.network.max_frame_bytes,
            self.shutdown_signal.clone(),
        ));

        let election = ha.leader_election(node_id, address);
        if !self.campaign(&election).await {
            info!(node_id, "shutdown requested before gaining leadership");
            server.abort();
            return Ok(());
        }

        let context = Arc::new(LeaderContext::new(
            Scheduler::new(election.session_id(), self.config.coordinator.worker_timeout()),
            ha.job_store(),
        ));
        self.recover_jobs(&context).await?;
        state.become_leader(context.clone());

        let result = self.lead(&election, &context).await;
        state.step_down();
        server.abort();
        result
    }

    /// Returns `false` when shutdown arrives first.
    async fn campaign(
        &mut self,
        election: &LeaderElection,
    ) -> bool {
        let retry_ms = self.config.coordinator.campaign_retry_ms;
        loop {
            match election.try_acquire().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("campaign attempt failed: {}", e),
            }

            let jitter = rand::thread_rng().gen_range(0..=retry_ms / 2);
            let backoff = Duration::from_millis(retry_ms + jitter);
            tokio::select! {
                _ = self.shutdown_signal.changed() => return false,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn recover_jobs(
        &self,
        context: &LeaderContext,
    ) -> Result<()> {
        let running = context.job_store.list_running().await?;
        let now = Instant::now();
        let mut scheduler = context.scheduler.lock();
        for record in running {
            info!(job_id = %record.job_id, "recovering job with a fresh attempt");
            scheduler.add_job(record.job_id, record.spec, now);
        }
        Ok(())
    }

    async fn lead(
        &mut self,
        election: &LeaderElection,
        context: &LeaderContext,
    ) -> Result<()> {
        let mut ticker = interval(self.config.coordination.renew_interval());
        loop {
            tokio::select! {
                _ = self.shutdown_signal.changed() => {
                    info!("shutdown requested, resigning leadership");
                    return election.resign().await;
                }
                _ = ticker.tick() => {
                    if let Err(e) = election.renew().await {
                        error!("stop leading: {}", e);
                        return Err(e);
                    }
                    let terminal = context.scheduler.lock().expire_workers(Instant::now());
                    context.persist(terminal).await;
                }
            }
        }
    }
}
