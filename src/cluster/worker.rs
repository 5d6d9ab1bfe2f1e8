//! In-process worker runtime.
//!
//! A worker follows the leader through its own discovery listener. Every new
//! leader session starts from scratch: running tasks of the previous session
//! are cancelled, the worker re-registers and polls for fresh assignments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::RpcClusterClient;
use super::TaskAssignment;
use super::TaskOutcome;
use super::TaskOutput;
use crate::discovery::LeaderInfo;
use crate::discovery::LeaderListener;
use crate::discovery::LeaderRetrievalService;
use crate::errors::TaskFailure;
use crate::Error;
use crate::NetworkError;
use crate::Result;

/// Runs the operators of one task.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        task: &TaskAssignment,
    ) -> Result<TaskOutput>;
}

pub struct WorkerRuntime {
    worker_id: String,
    retrieval: Box<dyn LeaderRetrievalService>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WorkerRuntime {
    /// Starts discovery and the worker loop.
    pub fn start(
        worker_id: impl Into<String>,
        slots: u32,
        retrieval: Box<dyn LeaderRetrievalService>,
        client: RpcClusterClient,
        executor: Arc<dyn TaskExecutor>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let worker_id = worker_id.into();
        let listener = retrieval.start()?;
        let cancel = CancellationToken::new();

        let worker = WorkerLoop {
            worker_id: worker_id.clone(),
            slots,
            listener,
            client,
            executor,
            poll_interval,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());
        info!(worker_id = %worker_id, slots, "worker started");

        Ok(Self {
            worker_id,
            retrieval,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Cancels every task, stops discovery and waits for the loop to exit.
    pub async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.retrieval.stop();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| Error::Fatal(format!("worker {} panicked: {e}", self.worker_id)))?;
            info!(worker_id = %self.worker_id, "worker closed");
        }
        Ok(())
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.retrieval.stop();
    }
}

struct WorkerLoop {
    worker_id: String,
    slots: u32,
    listener: LeaderListener,
    client: RpcClusterClient,
    executor: Arc<dyn TaskExecutor>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl WorkerLoop {
    async fn run(mut self) {
        loop {
            let leader = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = self.listener.next_leader() => match next {
                    Ok(leader) => leader,
                    Err(e) => {
                        warn!(worker_id = %self.worker_id, "leader discovery ended: {}", e);
                        break;
                    }
                },
            };
            info!(
                worker_id = %self.worker_id,
                "following leader {} at {}", leader.participant_id, leader.address
            );

            let session = self.cancel.child_token();
            self.serve_leader(&leader, &session).await;
        }
        debug!(worker_id = %self.worker_id, "worker loop exited");
    }

    /// Works for `leader` until it is replaced or the worker is closed.
    async fn serve_leader(
        &mut self,
        leader: &LeaderInfo,
        session: &CancellationToken,
    ) {
        let mut tasks = JoinSet::new();
        let mut registered: Option<String> = None;

        loop {
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                _ = session.cancelled() => break,
                changed = self.listener.changed() => match changed {
                    Ok(Some(next)) if next.session_id != leader.session_id => break,
                    Ok(_) => continue,
                    Err(_) => break,
                },
                _ = sleep(self.poll_interval) => {}
            }

            let Some(session_id) = registered.clone() else {
                match self.client.register_worker(&leader.address, &self.worker_id, self.slots).await {
                    Ok(session_id) => registered = Some(session_id),
                    Err(e) => debug!(worker_id = %self.worker_id, "registration pending: {}", e),
                }
                continue;
            };

            let free_slots = self.slots.saturating_sub(tasks.len() as u32);
            match self
                .client
                .poll_tasks(&leader.address, &self.worker_id, &session_id, free_slots)
                .await
            {
                Ok(assignments) => {
                    for task in assignments {
                        tasks.spawn(run_task(
                            self.client.clone(),
                            self.executor.clone(),
                            leader.address.clone(),
                            self.worker_id.clone(),
                            session_id.clone(),
                            task,
                            session.child_token(),
                        ));
                    }
                }
                Err(Error::Network(NetworkError::Rejected { reason, .. })) => {
                    warn!(worker_id = %self.worker_id, "poll rejected ({}), registering again", reason);
                    registered = None;
                }
                Err(e) => debug!(worker_id = %self.worker_id, "poll failed: {}", e),
            }
        }

        session.cancel();
        tasks.shutdown().await;
    }
}

async fn run_task(
    client: RpcClusterClient,
    executor: Arc<dyn TaskExecutor>,
    address: String,
    worker_id: String,
    session_id: String,
    task: TaskAssignment,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(worker_id = %worker_id, "task {:?} of attempt {} cancelled", task.kind, task.attempt);
            return;
        }
        result = executor.execute(&task) => match result {
            Ok(output) => TaskOutcome::Succeeded(output),
            Err(e) => {
                warn!(worker_id = %worker_id, "task {:?} failed: {}", task.kind, e);
                TaskOutcome::Failed(TaskFailure::from(&e))
            }
        },
    };

    if let Err(e) = client
        .report_task(&address, &worker_id, &session_id, &task, outcome)
        .await
    {
        warn!(worker_id = %worker_id, "failed to report task {}: {}", task.task_index, e);
    }
}
