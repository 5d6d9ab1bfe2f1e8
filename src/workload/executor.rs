use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::partition;
use super::verify_sum;
use super::PacingMapper;
use crate::cluster::TaskAssignment;
use crate::cluster::TaskExecutor;
use crate::cluster::TaskKind;
use crate::cluster::TaskOutput;
use crate::signal::finish_marker;
use crate::signal::FileSignalStore;
use crate::signal::SignalStore;
use crate::Error;
use crate::Result;

/// Operators of the paced summation job as executed by workers.
#[derive(Debug, Default, Clone)]
pub struct PacedSumExecutor;

impl PacedSumExecutor {
    pub fn new() -> Self {
        Self
    }
}

fn overflow(what: &str) -> Error {
    Error::WorkloadAssertionFailure(format!("{what} overflowed u64"))
}

#[async_trait]
impl TaskExecutor for PacedSumExecutor {
    async fn execute(
        &self,
        task: &TaskAssignment,
    ) -> Result<TaskOutput> {
        let workload = &task.workload;
        let signals: Arc<dyn SignalStore> = Arc::new(FileSignalStore::new(&workload.coordinate_dir));

        match &task.kind {
            TaskKind::Map { subtask } => {
                let mut mapper = PacingMapper::new(
                    *subtask,
                    signals,
                    Duration::from_millis(workload.pace_delay_ms),
                );
                let mut partial: u64 = 0;
                for value in partition(workload.num_elements, workload.parallelism, *subtask) {
                    let value = mapper.map(value).await?;
                    partial = partial.checked_add(value).ok_or_else(|| overflow("partial sum"))?;
                }
                debug!(subtask, partial, "map subtask done");
                Ok(TaskOutput::Partial(partial))
            }
            TaskKind::Reduce { partials } => {
                let sum = partials
                    .iter()
                    .try_fold(0u64, |acc, partial| acc.checked_add(*partial))
                    .ok_or_else(|| overflow("sum"))?;
                Ok(TaskOutput::Sum(sum))
            }
            TaskKind::Verify { subtask, sum } => {
                verify_sum(workload.num_elements, *sum)?;
                signals.signal(&finish_marker(*subtask)).await?;
                info!(subtask, sum, "verification passed");
                Ok(TaskOutput::Verified)
            }
        }
    }
}
