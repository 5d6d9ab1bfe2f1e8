use std::time::Duration;

use tokio::sync::watch;

use super::*;
use crate::utils::deadline::Deadline;
use crate::Error;

fn leader(
    participant_id: u32,
    session_id: &str,
) -> LeaderInfo {
    LeaderInfo {
        participant_id,
        address: format!("127.0.0.1:{}", 9000 + participant_id),
        session_id: session_id.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_leader_returns_current_leader_immediately() {
    let (_tx, rx) = watch::channel(Some(leader(0, "s0")));
    let mut listener = LeaderListener::new(rx);

    let found = listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(found, leader(0, "s0"));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_leader_suspends_until_elected() {
    let (tx, rx) = watch::channel(None);
    let mut listener = LeaderListener::new(rx);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(Some(leader(1, "s1"))).unwrap();
        // keep the channel open
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let found = listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(found.participant_id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_leader_times_out_without_election() {
    let (_tx, rx) = watch::channel(None);
    let mut listener = LeaderListener::new(rx);

    match listener
        .wait_for_leader(Deadline::from_now(Duration::from_millis(200)))
        .await
    {
        Err(Error::Timeout {
            stage, last_observed, ..
        }) => {
            assert_eq!(stage, "leader election");
            assert_eq!(last_observed.as_deref(), Some("None"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_flapping_leadership_yields_latest_leader() {
    let (tx, rx) = watch::channel(None);
    let mut listener = LeaderListener::new(rx);

    tx.send(Some(leader(0, "a"))).unwrap();
    tx.send(Some(leader(1, "b"))).unwrap();
    tx.send(Some(leader(0, "c"))).unwrap();

    let found = listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(found.session_id, "c");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_new_leader_skips_the_previous_session() {
    let (tx, rx) = watch::channel(Some(leader(0, "first")));
    let mut listener = LeaderListener::new(rx);
    listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(1)))
        .await
        .unwrap();

    // the old leader is still published, so this must time out
    let stale = listener
        .wait_for_new_leader(Deadline::from_now(Duration::from_millis(100)))
        .await;
    assert!(stale.unwrap_err().is_timeout());

    tx.send(None).unwrap();
    tx.send(Some(leader(1, "second"))).unwrap();
    let found = listener
        .wait_for_new_leader(Deadline::from_now(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(found.participant_id, 1);
    assert_eq!(found.session_id, "second");
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_is_fatal() {
    let (tx, rx) = watch::channel(None);
    let mut listener = LeaderListener::new(rx);
    drop(tx);

    assert!(matches!(
        listener
            .wait_for_leader(Deadline::from_now(Duration::from_secs(1)))
            .await,
        Err(Error::Fatal(_))
    ));
}
