use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;
use tracing::info;

use crate::constants::PROCEED_MARKER;
use crate::signal::ready_marker;
use crate::signal::SignalStore;
use crate::Error;
use crate::Result;

/// Values of `1..=num_elements` that round-robin redistribution sends to
/// `subtask`: value `v` lands on subtask `(v - 1) % parallelism`.
pub fn partition(
    num_elements: u64,
    parallelism: u32,
    subtask: u32,
) -> impl Iterator<Item = u64> {
    let step = parallelism.max(1) as usize;
    (u64::from(subtask) + 1..=num_elements).step_by(step)
}

/// `1 + 2 + .. + n`
pub fn expected_sum(num_elements: u64) -> u128 {
    let n = u128::from(num_elements);
    n * (n + 1) / 2
}

/// Fails with [`Error::WorkloadAssertionFailure`] unless `sum` is the sum of
/// `1..=num_elements`.
pub fn verify_sum(
    num_elements: u64,
    sum: u64,
) -> Result<()> {
    let expected = expected_sum(num_elements);
    if u128::from(sum) != expected {
        return Err(Error::WorkloadAssertionFailure(format!(
            "Sum of 1..={num_elements} should be {expected} but was {sum}"
        )));
    }
    Ok(())
}

/// Identity map that stalls its subtask until the test driver says proceed.
///
/// The first call signals `ready_<subtask>`. Until `proceed` exists every call
/// sleeps `pace_delay` before forwarding its value; once observed, the marker
/// is never checked again.
pub struct PacingMapper {
    subtask: u32,
    signals: Arc<dyn SignalStore>,
    pace_delay: Duration,
    ready_signaled: bool,
    released: bool,
}

impl PacingMapper {
    pub fn new(
        subtask: u32,
        signals: Arc<dyn SignalStore>,
        pace_delay: Duration,
    ) -> Self {
        Self {
            subtask,
            signals,
            pace_delay,
            ready_signaled: false,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub async fn map(
        &mut self,
        value: u64,
    ) -> Result<u64> {
        if !self.ready_signaled {
            self.signals.signal(&ready_marker(self.subtask)).await?;
            self.ready_signaled = true;
            debug!(subtask = self.subtask, "subtask ready");
        }

        if !self.released {
            if self.signals.exists(PROCEED_MARKER).await? {
                self.released = true;
                info!(subtask = self.subtask, "proceed observed, running at full speed");
            } else {
                sleep(self.pace_delay).await;
            }
        }
        Ok(value)
    }
}
