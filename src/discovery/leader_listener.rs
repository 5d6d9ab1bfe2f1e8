use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;

use super::LeaderInfo;
use crate::utils::deadline::Deadline;
use crate::Error;
use crate::Result;

/// Subscription to leader changes.
///
/// Remembers the session of the last leader it returned, which is what
/// [`LeaderListener::wait_for_new_leader`] compares against.
#[derive(Debug, Clone)]
pub struct LeaderListener {
    rx: watch::Receiver<Option<LeaderInfo>>,
    last_session: Option<String>,
}

impl LeaderListener {
    pub fn new(rx: watch::Receiver<Option<LeaderInfo>>) -> Self {
        Self { rx, last_session: None }
    }

    /// Latest published leader, if any.
    pub fn current(&self) -> Option<LeaderInfo> {
        self.rx.borrow().clone()
    }

    /// Returns the current leader or suspends until one is elected.
    pub async fn wait_for_leader(
        &mut self,
        deadline: Deadline,
    ) -> Result<LeaderInfo> {
        self.wait_matching("leader election", None, Some(deadline)).await
    }

    /// Waits for a leader whose session differs from the last one returned.
    pub async fn wait_for_new_leader(
        &mut self,
        deadline: Deadline,
    ) -> Result<LeaderInfo> {
        let previous = self.last_session.clone();
        self.wait_matching("new leader election", previous, Some(deadline)).await
    }

    /// Unbounded form of [`Self::wait_for_new_leader`] for long-lived followers.
    pub async fn next_leader(&mut self) -> Result<LeaderInfo> {
        let previous = self.last_session.clone();
        self.wait_matching("new leader election", previous, None).await
    }

    /// Resolves on the next published change.
    pub async fn changed(&mut self) -> Result<Option<LeaderInfo>> {
        self.rx
            .changed()
            .await
            .map_err(|_| Error::Fatal("leader retrieval service is gone".to_string()))?;
        Ok(self.rx.borrow_and_update().clone())
    }

    async fn wait_matching(
        &mut self,
        stage: &str,
        previous_session: Option<String>,
        deadline: Option<Deadline>,
    ) -> Result<LeaderInfo> {
        let is_match = |value: &Option<LeaderInfo>| {
            value
                .as_ref()
                .is_some_and(|leader| Some(&leader.session_id) != previous_session.as_ref())
        };

        let found = match deadline {
            Some(deadline) => match timeout(deadline.time_left(), self.rx.wait_for(is_match)).await {
                Ok(Ok(leader)) => Some(leader.clone()),
                Ok(Err(_)) => return Err(Error::Fatal("leader retrieval service is gone".to_string())),
                Err(_) => None,
            },
            None => match self.rx.wait_for(is_match).await {
                Ok(leader) => Some(leader.clone()),
                Err(_) => return Err(Error::Fatal("leader retrieval service is gone".to_string())),
            },
        };

        match found.flatten() {
            Some(leader) => {
                debug!(
                    "resolved leader {} at {} (session {})",
                    leader.participant_id, leader.address, leader.session_id
                );
                self.last_session = Some(leader.session_id.clone());
                Ok(leader)
            }
            None => {
                let last_observed = format!("{:?}", *self.rx.borrow());
                let waited = deadline.map(|d| d.elapsed()).unwrap_or_default();
                Err(Error::timeout(stage, waited, Some(last_observed)))
            }
        }
    }
}
