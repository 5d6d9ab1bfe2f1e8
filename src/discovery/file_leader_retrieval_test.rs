use std::path::Path;
use std::time::Duration;

use super::*;
use crate::config::CoordinationConfig;
use crate::coordination::LeaderElection;
use crate::test_utils::enable_logger;
use crate::utils::deadline::Deadline;

const LEASE_TTL: Duration = Duration::from_millis(300);

fn election(
    lease_path: &Path,
    participant_id: u32,
) -> LeaderElection {
    let config = CoordinationConfig {
        lease_ttl_ms: LEASE_TTL.as_millis() as u64,
        settle_delay_ms: 10,
        ..Default::default()
    };
    LeaderElection::new(
        lease_path.to_path_buf(),
        &config,
        participant_id,
        format!("127.0.0.1:{}", 7100 + participant_id),
    )
}

fn retrieval(lease_path: &Path) -> FileLeaderRetrieval {
    FileLeaderRetrieval::new(lease_path.to_path_buf(), LEASE_TTL, Duration::from_millis(20))
}

#[tokio::test]
async fn test_publishes_elected_leader() {
    enable_logger();
    let temp_dir = tempfile::tempdir().unwrap();
    let lease_path = temp_dir.path().join("dispatcher.lease");
    let service = retrieval(&lease_path);
    let mut listener = service.start().unwrap();
    assert!(listener.current().is_none());

    let leader = election(&lease_path, 0);
    assert!(leader.try_acquire().await.unwrap());

    let found = listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(found.session_id, leader.session_id());
    assert_eq!(found.address, "127.0.0.1:7100");
    service.stop();
}

#[tokio::test]
async fn test_follows_failover_to_a_new_session() {
    let temp_dir = tempfile::tempdir().unwrap();
    let lease_path = temp_dir.path().join("dispatcher.lease");
    let service = retrieval(&lease_path);
    let mut listener = service.start().unwrap();

    let first = election(&lease_path, 0);
    assert!(first.try_acquire().await.unwrap());
    listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();

    // first stops renewing, as a killed process would
    let second = election(&lease_path, 1);
    let campaign = async {
        loop {
            if second.try_acquire().await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), campaign).await.unwrap();

    let found = listener
        .wait_for_new_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(found.participant_id, 1);
    assert_eq!(found.session_id, second.session_id());
    service.stop();
}

#[tokio::test]
async fn test_expired_lease_is_published_as_no_leader() {
    let temp_dir = tempfile::tempdir().unwrap();
    let lease_path = temp_dir.path().join("dispatcher.lease");
    let leader = election(&lease_path, 0);
    assert!(leader.try_acquire().await.unwrap());

    let service = retrieval(&lease_path);
    let mut listener = service.start().unwrap();
    listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();

    let expired = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if listener.changed().await.unwrap().is_none() {
                break;
            }
        }
    })
    .await;
    assert!(expired.is_ok());
    service.stop();
}

#[tokio::test]
async fn test_stop_halts_publication() {
    let temp_dir = tempfile::tempdir().unwrap();
    let lease_path = temp_dir.path().join("dispatcher.lease");
    let service = retrieval(&lease_path);
    let listener = service.start().unwrap();
    assert!(service.is_running());

    service.stop();
    assert!(!service.is_running());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let leader = election(&lease_path, 0);
    assert!(leader.try_acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(listener.current().is_none());
}

#[tokio::test]
async fn test_start_twice_shares_one_watcher() {
    let temp_dir = tempfile::tempdir().unwrap();
    let lease_path = temp_dir.path().join("dispatcher.lease");
    let service = retrieval(&lease_path);

    let mut first = service.start().unwrap();
    let mut second = service.start().unwrap();

    let leader = election(&lease_path, 2);
    assert!(leader.try_acquire().await.unwrap());

    let deadline = Deadline::from_now(Duration::from_secs(5));
    assert_eq!(first.wait_for_leader(deadline).await.unwrap().participant_id, 2);
    assert_eq!(second.wait_for_leader(deadline).await.unwrap().participant_id, 2);
    service.stop();
}
