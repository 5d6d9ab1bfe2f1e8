use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::deadline::Deadline;
use crate::utils::poller::poll_until;
use crate::utils::poller::wait_until;
use crate::Error;
use crate::NetworkError;

#[tokio::test(start_paused = true)]
async fn test_poll_until_returns_first_satisfying_value() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = poll_until(
        "counter reaches 3",
        move || {
            let counter = counter_clone.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        },
        |v| *v >= 3,
        Duration::from_millis(50),
        Deadline::from_now(Duration::from_secs(10)),
    )
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_retries_check_errors_as_not_yet() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = poll_until(
        "service becomes reachable",
        move || {
            let counter = counter_clone.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(NetworkError::ConnectionClosed("127.0.0.1:1".to_string()).into())
                } else {
                    Ok(attempt)
                }
            }
        },
        |_| true,
        Duration::from_millis(50),
        Deadline::from_now(Duration::from_secs(10)),
    )
    .await;

    assert_eq!(result.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_times_out_with_last_observed_value() {
    let result = poll_until(
        "workers connected",
        || async { Ok(1u32) },
        |v| *v >= 2,
        Duration::from_millis(50),
        Deadline::from_now(Duration::from_millis(500)),
    )
    .await;

    match result {
        Err(Error::Timeout {
            stage,
            last_observed,
            ..
        }) => {
            assert_eq!(stage, "workers connected");
            assert_eq!(last_observed.as_deref(), Some("1"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_times_out_with_last_check_error() {
    let result: crate::Result<u32> = poll_until(
        "leader reachable",
        || async { Err(NetworkError::NotLeader("127.0.0.1:9".to_string()).into()) },
        |_| true,
        Duration::from_millis(50),
        Deadline::from_now(Duration::from_millis(200)),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("not the leader"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_bounds_a_hanging_check() {
    let result: crate::Result<u32> = poll_until(
        "hanging check",
        || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        },
        |_| true,
        Duration::from_millis(50),
        Deadline::from_now(Duration::from_secs(1)),
    )
    .await;

    match result {
        Err(Error::Timeout { last_observed, .. }) => {
            assert_eq!(last_observed.as_deref(), Some("check did not complete"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_boolean_condition() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    wait_until(
        "flag raised",
        move || {
            let counter = counter_clone.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) == 4 }
        },
        Duration::from_millis(10),
        Deadline::from_now(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
}
