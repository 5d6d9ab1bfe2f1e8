//! Failure-injection harness error hierarchy
//!
//! Separates fatal scenario failures (launch, timeout, workload assertion) from
//! the best-effort teardown failures that are only ever logged.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS process for a cluster participant could not be created
    #[error("Failed to launch participant {identity}: {source}")]
    LaunchFailure {
        identity: u32,
        #[source]
        source: std::io::Error,
    },

    /// A bounded wait exceeded its deadline
    #[error("Timed out after {waited:?} waiting for {stage} (last observed: {})", last_observed.as_deref().unwrap_or("nothing"))]
    Timeout {
        stage: String,
        waited: Duration,
        last_observed: Option<String>,
    },

    /// The workload's verification stage computed an incorrect result
    #[error("{0}")]
    WorkloadAssertionFailure(String),

    /// A best-effort teardown step failed
    #[error("Cleanup failed: {0}")]
    CleanupFailure(String),

    /// The submitted job failed remotely for a reason other than verification
    #[error("Job failed with {error_type}: {message}")]
    JobFailed { error_type: String, message: String },

    /// The workload task went away without delivering its result
    #[error("Workload task aborted: {0}")]
    WorkloadAborted(String),

    /// Marker names must be plain ASCII file names
    #[error("Invalid marker name: {0:?}")]
    InvalidMarker(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Connect to {address} failed: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {address} timed out after {duration:?}")]
    RequestTimeout { address: String, duration: Duration },

    #[error("Connection to {0} closed before a response arrived")]
    ConnectionClosed(String),

    #[error("Participant at {0} is not the leader")]
    NotLeader(String),

    #[error("Unexpected response from {address}: {response}")]
    UnexpectedResponse { address: String, response: String },

    #[error("Rejected by {address}: {reason}")]
    Rejected { address: String, reason: String },

    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("Leadership of {role} lost by session {session_id}")]
    LeadershipLost { role: String, session_id: String },

    #[error("Lease file {0} is corrupted")]
    CorruptedLease(PathBuf),

    #[error("Job {0} not found in job store")]
    JobNotFound(String),

    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

impl Error {
    /// Stable type name used when an error crosses a process boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::LaunchFailure { .. } => "LaunchFailure",
            Error::Timeout { .. } => "Timeout",
            Error::WorkloadAssertionFailure(_) => "WorkloadAssertionFailure",
            Error::CleanupFailure(_) => "CleanupFailure",
            Error::JobFailed { .. } => "JobFailed",
            Error::WorkloadAborted(_) => "WorkloadAborted",
            Error::InvalidMarker(_) => "InvalidMarker",
            Error::Config(_) | Error::InvalidConfig(_) => "ConfigError",
            Error::Network(_) => "NetworkError",
            Error::Coordination(_) => "CoordinationError",
            Error::Io(_) | Error::PathError { .. } => "IoError",
            Error::TomlSer(_) => "SerializationError",
            Error::Fatal(_) => "Fatal",
        }
    }

    pub(crate) fn timeout(
        stage: impl Into<String>,
        waited: Duration,
        last_observed: Option<String>,
    ) -> Self {
        Error::Timeout {
            stage: stage.into(),
            waited,
            last_observed,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Serializable form of a task or job failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub error_type: String,
    pub message: String,
}

impl From<&Error> for TaskFailure {
    fn from(e: &Error) -> Self {
        let message = match e {
            // keep the bare assertion text so it survives the round trip unchanged
            Error::WorkloadAssertionFailure(msg) => msg.clone(),
            Error::JobFailed { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let error_type = match e {
            Error::JobFailed { error_type, .. } => error_type.clone(),
            other => other.kind().to_string(),
        };
        TaskFailure {
            error_type,
            message,
        }
    }
}

impl TaskFailure {
    /// Rebuilds the error on the receiving side, preserving its type name.
    pub fn into_error(self) -> Error {
        match self.error_type.as_str() {
            "WorkloadAssertionFailure" => Error::WorkloadAssertionFailure(self.message),
            _ => Error::JobFailed {
                error_type: self.error_type,
                message: self.message,
            },
        }
    }
}
