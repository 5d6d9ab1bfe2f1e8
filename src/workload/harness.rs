use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cluster::ClusterClient;
use crate::cluster::JobId;
use crate::cluster::JobSpec;
use crate::cluster::JobStatus;
use crate::cluster::RestartStrategy;
use crate::cluster::WorkloadSpec;
use crate::config::WorkloadConfig;
use crate::discovery::LeaderListener;
use crate::utils::deadline::Deadline;
use crate::utils::poller::poll_until;
use crate::Error;
use crate::Result;

pub const WORKLOAD_JOB_NAME: &str = "paced-sum-verification";

/// Body of the workload task: submits the job detached, then only observes it.
pub struct WorkloadHarness {
    client: Arc<dyn ClusterClient>,
    listener: LeaderListener,
    spec: JobSpec,
    poll_interval: Duration,
}

impl WorkloadHarness {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        listener: LeaderListener,
        spec: JobSpec,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            listener,
            spec,
            poll_interval,
        }
    }

    /// Job description for `config`, signaling through `coordinate_dir`.
    pub fn job_spec(
        config: &WorkloadConfig,
        coordinate_dir: impl Into<PathBuf>,
    ) -> JobSpec {
        JobSpec {
            name: WORKLOAD_JOB_NAME.to_string(),
            workload: WorkloadSpec::from_config(config, coordinate_dir),
            restart: RestartStrategy::from_config(config),
        }
    }

    /// Runs the job to completion.
    ///
    /// # Errors
    /// The job's own failure, rebuilt with its original type and message, or
    /// [`Error::Timeout`] when `deadline` passes first.
    pub async fn run(
        self,
        deadline: Deadline,
    ) -> Result<()> {
        let job_id = self.submit(deadline).await?;
        info!(%job_id, "workload submitted");

        match self.follow(&job_id, deadline).await? {
            JobStatus::Finished => {
                info!(%job_id, "workload finished");
                Ok(())
            }
            JobStatus::Failed(failure) => Err(failure.into_error()),
            JobStatus::Running => Err(Error::Fatal(format!("job {job_id} reported running as terminal"))),
        }
    }

    async fn submit(
        &self,
        deadline: Deadline,
    ) -> Result<JobId> {
        poll_until(
            "job submission",
            || {
                let client = self.client.clone();
                let mut listener = self.listener.clone();
                let spec = self.spec.clone();
                async move {
                    let leader = listener.wait_for_leader(deadline).await?;
                    client.submit_job(&leader, spec).await
                }
            },
            |_| true,
            self.poll_interval,
            deadline,
        )
        .await
    }

    /// Polls the job status, re-resolving the leader on every poll.
    async fn follow(
        &self,
        job_id: &JobId,
        deadline: Deadline,
    ) -> Result<JobStatus> {
        let stage = format!("job {job_id} to terminate");
        poll_until(
            &stage,
            || {
                let client = self.client.clone();
                let mut listener = self.listener.clone();
                async move {
                    let leader = listener.wait_for_leader(deadline).await?;
                    client.job_status(&leader, job_id).await
                }
            },
            |status| status.is_terminal(),
            self.poll_interval,
            deadline,
        )
        .await
    }
}
