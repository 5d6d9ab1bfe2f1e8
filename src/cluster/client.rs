use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::protocol::framed;
use super::protocol::recv_message;
use super::protocol::send_message;
use super::ClusterOverview;
use super::JobId;
use super::JobSpec;
use super::JobStatus;
use super::Request;
use super::Response;
use super::TaskAssignment;
use super::TaskOutcome;
use crate::config::NetworkConfig;
use crate::discovery::LeaderInfo;
use crate::NetworkError;
use crate::Result;

/// Control interface of the cluster, always addressed at a resolved leader.
///
/// Callers re-resolve the leader before every call; a leader reference taken
/// before a failover is stale.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    async fn cluster_overview(
        &self,
        leader: &LeaderInfo,
    ) -> Result<ClusterOverview>;

    async fn submit_job(
        &self,
        leader: &LeaderInfo,
        spec: JobSpec,
    ) -> Result<JobId>;

    async fn job_status(
        &self,
        leader: &LeaderInfo,
        job_id: &JobId,
    ) -> Result<JobStatus>;
}

/// One-request-per-connection client over framed TCP.
#[derive(Debug, Clone)]
pub struct RpcClusterClient {
    network: NetworkConfig,
}

impl RpcClusterClient {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network }
    }

    /// Sends `request` to `address` and returns the response.
    ///
    /// `NotLeader` and `Rejected` answers are mapped to [`NetworkError`]s.
    pub async fn call(
        &self,
        address: &str,
        request: Request,
    ) -> Result<Response> {
        let connect_timeout = self.network.connect_timeout();
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| NetworkError::RequestTimeout {
                address: address.to_string(),
                duration: connect_timeout,
            })?
            .map_err(|source| NetworkError::ConnectFailed {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true).ok();

        let mut stream = framed(stream, self.network.max_frame_bytes);
        let exchange = async {
            send_message(&mut stream, &request).await?;
            match recv_message::<Response>(&mut stream).await {
                Some(response) => response,
                None => Err(NetworkError::ConnectionClosed(address.to_string())),
            }
        };

        let request_timeout = self.network.request_timeout();
        let response = timeout(request_timeout, exchange)
            .await
            .map_err(|_| NetworkError::RequestTimeout {
                address: address.to_string(),
                duration: request_timeout,
            })??;
        trace!("{} answered {:?}", address, response);

        match response {
            Response::NotLeader => Err(NetworkError::NotLeader(address.to_string()).into()),
            Response::Rejected(reason) => Err(NetworkError::Rejected {
                address: address.to_string(),
                reason,
            }
            .into()),
            other => Ok(other),
        }
    }

    /// Registers a worker and returns the leader session it registered with.
    pub async fn register_worker(
        &self,
        address: &str,
        worker_id: &str,
        slots: u32,
    ) -> Result<String> {
        let request = Request::RegisterWorker {
            worker_id: worker_id.to_string(),
            slots,
        };
        match self.call(address, request).await? {
            Response::Registered { session_id } => Ok(session_id),
            other => Err(unexpected(address, other)),
        }
    }

    pub async fn poll_tasks(
        &self,
        address: &str,
        worker_id: &str,
        session_id: &str,
        free_slots: u32,
    ) -> Result<Vec<TaskAssignment>> {
        let request = Request::PollTasks {
            worker_id: worker_id.to_string(),
            session_id: session_id.to_string(),
            free_slots,
        };
        match self.call(address, request).await? {
            Response::Tasks(tasks) => Ok(tasks),
            other => Err(unexpected(address, other)),
        }
    }

    pub async fn report_task(
        &self,
        address: &str,
        worker_id: &str,
        session_id: &str,
        task: &TaskAssignment,
        outcome: TaskOutcome,
    ) -> Result<()> {
        let request = Request::ReportTask {
            worker_id: worker_id.to_string(),
            session_id: session_id.to_string(),
            job_id: task.job_id.clone(),
            attempt: task.attempt,
            task_index: task.task_index,
            outcome,
        };
        match self.call(address, request).await? {
            Response::Ack => Ok(()),
            other => Err(unexpected(address, other)),
        }
    }
}

#[async_trait]
impl ClusterClient for RpcClusterClient {
    async fn cluster_overview(
        &self,
        leader: &LeaderInfo,
    ) -> Result<ClusterOverview> {
        match self.call(&leader.address, Request::ClusterOverview).await? {
            Response::Overview(overview) => Ok(overview),
            other => Err(unexpected(&leader.address, other)),
        }
    }

    async fn submit_job(
        &self,
        leader: &LeaderInfo,
        spec: JobSpec,
    ) -> Result<JobId> {
        match self.call(&leader.address, Request::SubmitJob(spec)).await? {
            Response::Submitted(job_id) => Ok(job_id),
            other => Err(unexpected(&leader.address, other)),
        }
    }

    async fn job_status(
        &self,
        leader: &LeaderInfo,
        job_id: &JobId,
    ) -> Result<JobStatus> {
        match self.call(&leader.address, Request::JobStatus(job_id.clone())).await? {
            Response::Status(status) => Ok(status),
            other => Err(unexpected(&leader.address, other)),
        }
    }
}

fn unexpected(
    address: &str,
    response: Response,
) -> crate::Error {
    NetworkError::UnexpectedResponse {
        address: address.to_string(),
        response: format!("{response:?}"),
    }
    .into()
}
