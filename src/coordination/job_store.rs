use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tokio::fs;
use tracing::debug;
use tracing::warn;

use crate::cluster::JobId;
use crate::cluster::JobSpec;
use crate::cluster::JobStatus;
use crate::utils::file_io;
use crate::CoordinationError;
use crate::Error;
use crate::Result;

const JOB_FILE_SUFFIX: &str = "job";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub spec: JobSpec,
    pub status: JobStatus,
}

/// Durable record of submitted jobs, read by every new leader.
#[derive(Debug, Clone)]
pub struct JobGraphStore {
    dir: PathBuf,
}

impl JobGraphStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(
        &self,
        job_id: &JobId,
    ) -> PathBuf {
        self.dir.join(format!("{job_id}.{JOB_FILE_SUFFIX}"))
    }

    pub async fn put(
        &self,
        record: &JobRecord,
    ) -> Result<()> {
        file_io::create_dir_if_not_exist(&self.dir).await?;
        let bytes = bincode::serialize(record).map_err(CoordinationError::from)?;
        file_io::write_atomically(&self.path_of(&record.job_id), &bytes).await?;
        debug!(job_id = %record.job_id, status = ?record.status, "job record stored");
        Ok(())
    }

    pub async fn get(
        &self,
        job_id: &JobId,
    ) -> Result<Option<JobRecord>> {
        match file_io::read_if_exists(&self.path_of(job_id)).await? {
            None => Ok(None),
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(CoordinationError::from)?)),
        }
    }

    /// Every readable record; unreadable files are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(Error::PathError {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOB_FILE_SUFFIX) {
                continue;
            }
            let Some(bytes) = file_io::read_if_exists(&path).await? else {
                continue;
            };
            match bincode::deserialize::<JobRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unreadable job record {}: {}", path.display(), e),
            }
        }
        records.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Ok(records)
    }

    pub async fn list_running(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| !record.status.is_terminal())
            .collect())
    }

    pub async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
    ) -> Result<()> {
        let mut record = self
            .get(job_id)
            .await?
            .ok_or_else(|| CoordinationError::JobNotFound(job_id.to_string()))?;
        record.status = status;
        self.put(&record).await
    }
}
