use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::HarnessConfig;
use crate::Result;

/// Bounded buffer of the most recent output lines of one participant
#[derive(Debug, Clone)]
pub(crate) struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub(crate) fn push(
        &self,
        line: String,
    ) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Forwards every line of `reader` into the buffer until EOF.
    pub(crate) fn capture<R>(
        &self,
        identity: u32,
        stream: &'static str,
        reader: R,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut lines = LinesStream::new(BufReader::new(reader).lines());
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => buffer.push(line),
                    Err(e) => {
                        debug!(identity, stream, "stop reading participant output: {}", e);
                        break;
                    }
                }
            }
        })
    }
}

/// One running coordinator process.
///
/// Dropping the handle kills the process (`kill_on_drop`).
#[derive(Debug)]
pub struct ParticipantProcess {
    identity: u32,
    config: HarnessConfig,
    config_path: PathBuf,
    pid: Option<u32>,
    pub(super) child: Child,
    log: LogBuffer,
    readers: Vec<JoinHandle<()>>,
}

impl ParticipantProcess {
    pub(super) fn new(
        identity: u32,
        config: HarnessConfig,
        config_path: PathBuf,
        child: Child,
        log: LogBuffer,
        readers: Vec<JoinHandle<()>>,
    ) -> Self {
        let pid = child.id();
        Self {
            identity,
            config,
            config_path,
            pid,
            child,
            log,
            readers,
        }
    }

    pub fn identity(&self) -> u32 {
        self.identity
    }

    /// Configuration snapshot the process was launched with
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking liveness check; reaps the process when it has exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(identity = self.identity, "participant exited with {}", status);
                false
            }
            Err(e) => {
                warn!(identity = self.identity, "failed to query participant status: {}", e);
                false
            }
        }
    }

    /// Sends SIGKILL and reaps. Killing an exited process is a no-op.
    pub async fn kill(&mut self) -> Result<()> {
        if let Some(status) = self.child.try_wait()? {
            debug!(identity = self.identity, "participant already exited with {}", status);
            return Ok(());
        }

        self.child.kill().await?;
        info!(identity = self.identity, pid = ?self.pid, "participant killed");
        Ok(())
    }

    /// Output captured so far, oldest line first
    pub fn log_lines(&self) -> Vec<String> {
        self.log.snapshot()
    }

    /// Whether both output readers reached EOF.
    pub fn output_closed(&self) -> bool {
        self.readers.iter().all(|reader| reader.is_finished())
    }
}
