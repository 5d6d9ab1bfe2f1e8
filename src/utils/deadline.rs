//! Absolute deadline threaded through every blocking call of a scenario.
//!
//! A [`Deadline`] is derived once and passed by value; each wait computes its
//! own remaining budget instead of re-deriving timeouts at the call site.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started_at: Instant,
    expires_at: Instant,
}

impl Deadline {
    pub fn from_now(timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            expires_at: started_at + timeout,
        }
    }

    /// Remaining budget, zero once the deadline has passed.
    pub fn time_left(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_overdue(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time spent since the deadline was derived.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
