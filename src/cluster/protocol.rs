//! Request/response messages exchanged with a coordinator.
//!
//! Every message travels as one bincode payload inside a length-delimited
//! frame; a connection carries exactly one request and its response.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use futures::SinkExt;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::codec::LengthDelimitedCodec;

use crate::config::WorkloadConfig;
use crate::errors::TaskFailure;
use crate::NetworkError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        JobId(nanoid::nanoid!(12))
    }
}

impl fmt::Display for JobId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of the paced summation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub num_elements: u64,
    pub parallelism: u32,
    pub pace_delay_ms: u64,
    /// Marker directory shared with the test driver
    pub coordinate_dir: PathBuf,
}

impl WorkloadSpec {
    pub fn from_config(
        config: &WorkloadConfig,
        coordinate_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            num_elements: config.num_elements,
            parallelism: config.parallelism,
            pace_delay_ms: config.pace_delay_ms,
            coordinate_dir: coordinate_dir.into(),
        }
    }
}

/// Fixed-delay restart strategy applied to task failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartStrategy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RestartStrategy {
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self {
            max_attempts: config.max_restart_attempts,
            delay_ms: config.restart_delay_ms,
        }
    }
}

impl Default for RestartStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub workload: WorkloadSpec,
    pub restart: RestartStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Finished,
    Failed(TaskFailure),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOverview {
    pub workers_connected: u32,
    pub slots_total: u32,
    pub jobs_running: u32,
}

/// Work item of one job attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Paced sum over the `subtask` partition of the input
    Map { subtask: u32 },
    /// Final aggregation of every map partial
    Reduce { partials: Vec<u64> },
    /// Checks the aggregated sum and signals completion
    Verify { subtask: u32, sum: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub job_id: JobId,
    pub attempt: u32,
    /// Unique within one attempt
    pub task_index: u32,
    pub kind: TaskKind,
    pub workload: WorkloadSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutput {
    Partial(u64),
    Sum(u64),
    Verified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Succeeded(TaskOutput),
    Failed(TaskFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    ClusterOverview,
    SubmitJob(JobSpec),
    JobStatus(JobId),
    RegisterWorker {
        worker_id: String,
        slots: u32,
    },
    PollTasks {
        worker_id: String,
        session_id: String,
        free_slots: u32,
    },
    ReportTask {
        worker_id: String,
        session_id: String,
        job_id: JobId,
        attempt: u32,
        task_index: u32,
        outcome: TaskOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Overview(ClusterOverview),
    Submitted(JobId),
    Status(JobStatus),
    Registered { session_id: String },
    Tasks(Vec<TaskAssignment>),
    Ack,
    NotLeader,
    Rejected(String),
}

pub(crate) type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

pub(crate) fn framed(
    stream: TcpStream,
    max_frame_bytes: usize,
) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec();
    Framed::new(stream, codec)
}

pub(crate) async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    message: &T,
) -> Result<(), NetworkError> {
    let payload = bincode::serialize(message)?;
    stream
        .send(Bytes::from(payload))
        .await
        .map_err(|e| NetworkError::ConnectionClosed(e.to_string()))
}

/// Reads the next frame; `None` when the peer closed the connection.
pub(crate) async fn recv_message<T: DeserializeOwned>(stream: &mut MessageStream) -> Option<Result<T, NetworkError>> {
    let frame = stream.next().await?;
    Some(match frame {
        Ok(bytes) => bincode::deserialize(&bytes).map_err(NetworkError::from),
        Err(e) => Err(NetworkError::ConnectionClosed(e.to_string())),
    })
}
