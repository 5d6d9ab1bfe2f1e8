use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::SignalStore;
use crate::utils::deadline::Deadline;
use crate::utils::file_io;
use crate::utils::poller::poll_until;
use crate::Error;
use crate::Result;

/// [`SignalStore`] backed by empty files in one shared directory.
#[derive(Debug, Clone)]
pub struct FileSignalStore {
    dir: PathBuf,
}

impl FileSignalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Opens the store, creating its directory when missing.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        file_io::create_dir_if_not_exist(&store.dir).await?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(
        &self,
        name: &str,
    ) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidMarker(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl SignalStore for FileSignalStore {
    async fn signal(
        &self,
        name: &str,
    ) -> Result<()> {
        let path = self.marker_path(name)?;
        file_io::touch(&path).await?;
        debug!("signaled marker {}", path.display());
        Ok(())
    }

    async fn exists(
        &self,
        name: &str,
    ) -> Result<bool> {
        let path = self.marker_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn count(
        &self,
        prefix: &str,
    ) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(Error::PathError {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_str().is_some_and(|name| name.starts_with(prefix)) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn await_markers(
        &self,
        prefix: &str,
        count: usize,
        interval: Duration,
        deadline: Deadline,
    ) -> Result<usize> {
        let stage = format!("{count} marker(s) with prefix '{prefix}' in {}", self.dir.display());
        poll_until(&stage, || self.count(prefix), |found| *found >= count, interval, deadline).await
    }
}
