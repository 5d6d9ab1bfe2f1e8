//! Deadline-bounded retry-until-true primitive.
//!
//! Check failures are treated exactly like an unsatisfied predicate: services
//! that are not reachable yet are the normal case while a cluster is forming.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use super::deadline::Deadline;
use crate::Error;
use crate::Result;

/// Repeatedly invokes `check` until `predicate` holds for its value.
///
/// Returns the first satisfying value. Once `deadline` passes, fails with
/// [`Error::Timeout`] carrying the `Debug` form of the last value, or the last
/// check error when no value was ever produced.
pub async fn poll_until<T, F, Fut, P>(
    stage: &str,
    mut check: F,
    mut predicate: P,
    interval: Duration,
    deadline: Deadline,
) -> Result<T>
where
    T: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let mut last_observed: Option<String> = None;
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        match timeout(deadline.time_left(), check()).await {
            Ok(Ok(value)) => {
                if predicate(&value) {
                    debug!(stage, attempts, "condition satisfied after {:?}", deadline.elapsed());
                    return Ok(value);
                }
                trace!(stage, "not yet: {:?}", value);
                last_observed = Some(format!("{value:?}"));
            }
            Ok(Err(e)) => {
                debug!(stage, "check failed, retrying: {}", e);
                last_observed = Some(format!("check error: {e}"));
            }
            Err(_) => {
                last_observed.get_or_insert_with(|| "check did not complete".to_string());
            }
        }

        if deadline.is_overdue() {
            return Err(Error::timeout(stage, deadline.elapsed(), last_observed));
        }

        sleep(interval.min(deadline.time_left())).await;
    }
}

/// Boolean form of [`poll_until`].
pub async fn wait_until<F, Fut>(
    stage: &str,
    mut condition: F,
    interval: Duration,
    deadline: Deadline,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(
        stage,
        || {
            let fut = condition();
            async move { Ok(fut.await) }
        },
        |satisfied| *satisfied,
        interval,
        deadline,
    )
    .await
    .map(|_| ())
}
