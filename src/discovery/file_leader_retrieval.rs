use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::LeaderInfo;
use super::LeaderListener;
use super::LeaderRetrievalService;
use crate::coordination::read_lease;
use crate::utils::time::get_now_as_millis;
use crate::Result;

/// Publishes the holder of a lease file while the lease is live.
pub struct FileLeaderRetrieval {
    lease_path: PathBuf,
    lease_ttl: Duration,
    poll_interval: Duration,
    leader_tx: Arc<watch::Sender<Option<LeaderInfo>>>,
    running: Mutex<Option<CancellationToken>>,
}

impl FileLeaderRetrieval {
    pub fn new(
        lease_path: PathBuf,
        lease_ttl: Duration,
        poll_interval: Duration,
    ) -> Self {
        let (leader_tx, _) = watch::channel(None);
        Self {
            lease_path,
            lease_ttl,
            poll_interval,
            leader_tx: Arc::new(leader_tx),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl LeaderRetrievalService for FileLeaderRetrieval {
    fn start(&self) -> Result<LeaderListener> {
        let mut running = self.running.lock();
        if running.is_none() {
            let token = CancellationToken::new();
            tokio::spawn(watch_lease(
                self.lease_path.clone(),
                self.lease_ttl,
                self.poll_interval,
                self.leader_tx.clone(),
                token.clone(),
            ));
            *running = Some(token);
            debug!("leader retrieval started for {}", self.lease_path.display());
        }
        Ok(LeaderListener::new(self.leader_tx.subscribe()))
    }

    fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
            debug!("leader retrieval stopped for {}", self.lease_path.display());
        }
    }
}

impl Drop for FileLeaderRetrieval {
    fn drop(&mut self) {
        if let Some(token) = self.running.get_mut().take() {
            warn!(
                "leader retrieval for {} dropped without stop(), cancelling",
                self.lease_path.display()
            );
            token.cancel();
        }
    }
}

async fn watch_lease(
    lease_path: PathBuf,
    lease_ttl: Duration,
    poll_interval: Duration,
    leader_tx: Arc<watch::Sender<Option<LeaderInfo>>>,
    token: CancellationToken,
) {
    loop {
        match read_lease(&lease_path).await {
            Ok(record) => {
                let observed = record
                    .filter(|r| r.is_live(lease_ttl, get_now_as_millis()))
                    .map(LeaderInfo::from);
                leader_tx.send_if_modified(|current| {
                    if *current == observed {
                        return false;
                    }
                    match &observed {
                        Some(leader) => info!(
                            "leader changed to participant {} at {} (session {})",
                            leader.participant_id, leader.address, leader.session_id
                        ),
                        None => info!("no live leader in {}", lease_path.display()),
                    }
                    *current = observed.clone();
                    true
                });
            }
            Err(e) => debug!("failed to read lease {}: {}", lease_path.display(), e),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep(poll_interval) => {}
        }
    }
}
