use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tokio::fs;
use tracing::debug;
use tracing::info;

use crate::config::CoordinationConfig;
use crate::utils::file_io;
use crate::utils::time::get_now_as_millis;
use crate::CoordinationError;
use crate::Result;

/// Content of a leader lease file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    pub participant_id: u32,
    pub address: String,
    /// Unique per leadership term
    pub session_id: String,
    pub renewed_at_ms: u64,
}

impl LeaderRecord {
    pub fn is_live(
        &self,
        lease_ttl: Duration,
        now_ms: u64,
    ) -> bool {
        now_ms.saturating_sub(self.renewed_at_ms) < lease_ttl.as_millis() as u64
    }
}

/// Reads the lease at `path`; `None` when nobody ever acquired it.
pub async fn read_lease(path: &Path) -> Result<Option<LeaderRecord>> {
    match file_io::read_if_exists(path).await? {
        None => Ok(None),
        Some(bytes) => {
            let record = bincode::deserialize(&bytes)
                .map_err(|_| CoordinationError::CorruptedLease(path.to_path_buf()))?;
            Ok(Some(record))
        }
    }
}

/// Campaigns for one role on behalf of one participant.
///
/// Each instance owns a fresh session id, so a restarted participant never
/// mistakes an old lease for its own.
#[derive(Debug)]
pub struct LeaderElection {
    lease_path: PathBuf,
    role: String,
    participant_id: u32,
    address: String,
    session_id: String,
    lease_ttl: Duration,
    settle_delay: Duration,
}

impl LeaderElection {
    pub fn new(
        lease_path: PathBuf,
        config: &CoordinationConfig,
        participant_id: u32,
        address: impl Into<String>,
    ) -> Self {
        Self {
            lease_path,
            role: config.role.clone(),
            participant_id,
            address: address.into(),
            session_id: nanoid::nanoid!(),
            lease_ttl: config.lease_ttl(),
            settle_delay: config.settle_delay(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn lease_path(&self) -> &Path {
        &self.lease_path
    }

    fn record(&self) -> LeaderRecord {
        LeaderRecord {
            participant_id: self.participant_id,
            address: self.address.clone(),
            session_id: self.session_id.clone(),
            renewed_at_ms: get_now_as_millis(),
        }
    }

    fn owns(
        &self,
        record: &LeaderRecord,
    ) -> bool {
        record.session_id == self.session_id
    }

    async fn write_lease(&self) -> Result<()> {
        let bytes = bincode::serialize(&self.record()).map_err(CoordinationError::from)?;
        file_io::write_atomically(&self.lease_path, &bytes).await
    }

    /// Takes the lease when it is free or expired.
    ///
    /// Concurrent contenders may both write; the lease is re-read after the
    /// settle delay and only the last writer wins.
    pub async fn try_acquire(&self) -> Result<bool> {
        if let Some(current) = read_lease(&self.lease_path).await? {
            if !self.owns(&current) && current.is_live(self.lease_ttl, get_now_as_millis()) {
                debug!(
                    role = %self.role,
                    "lease held by participant {} (session {})",
                    current.participant_id,
                    current.session_id
                );
                return Ok(false);
            }
        }

        self.write_lease().await?;
        tokio::time::sleep(self.settle_delay).await;

        let confirmed = read_lease(&self.lease_path)
            .await?
            .is_some_and(|record| self.owns(&record));
        if confirmed {
            info!(
                role = %self.role,
                participant_id = self.participant_id,
                session_id = %self.session_id,
                "acquired leadership"
            );
        }
        Ok(confirmed)
    }

    /// Refreshes the lease timestamp.
    ///
    /// # Errors
    /// [`CoordinationError::LeadershipLost`] once the lease names another
    /// session or has disappeared.
    pub async fn renew(&self) -> Result<()> {
        let still_ours = read_lease(&self.lease_path)
            .await?
            .is_some_and(|record| self.owns(&record));
        if !still_ours {
            return Err(CoordinationError::LeadershipLost {
                role: self.role.clone(),
                session_id: self.session_id.clone(),
            }
            .into());
        }
        self.write_lease().await
    }

    /// Releases the lease if this session still holds it.
    pub async fn resign(&self) -> Result<()> {
        let ours = read_lease(&self.lease_path)
            .await?
            .is_some_and(|record| self.owns(&record));
        if ours {
            if let Err(e) = fs::remove_file(&self.lease_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
            info!(role = %self.role, session_id = %self.session_id, "resigned leadership");
        }
        Ok(())
    }
}
