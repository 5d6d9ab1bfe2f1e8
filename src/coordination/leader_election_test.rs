use std::path::Path;
use std::time::Duration;

use super::*;
use crate::config::CoordinationConfig;
use crate::test_utils::enable_logger;
use crate::utils::file_io;
use crate::utils::time::get_now_as_millis;
use crate::CoordinationError;
use crate::Error;

fn coordination_config(ha_dir: &Path) -> CoordinationConfig {
    CoordinationConfig {
        ha_dir: ha_dir.to_path_buf(),
        lease_ttl_ms: 300,
        renew_interval_ms: 50,
        settle_delay_ms: 20,
        ..Default::default()
    }
}

fn election(
    ha_dir: &Path,
    participant_id: u32,
) -> LeaderElection {
    let config = coordination_config(ha_dir);
    LeaderElection::new(
        ha_dir.join("dispatcher.lease"),
        &config,
        participant_id,
        format!("127.0.0.1:{}", 7000 + participant_id),
    )
}

#[test]
fn test_lease_liveness_uses_ttl() {
    let record = LeaderRecord {
        participant_id: 0,
        address: "127.0.0.1:1".into(),
        session_id: "s".into(),
        renewed_at_ms: 1_000,
    };
    assert!(record.is_live(Duration::from_millis(500), 1_499));
    assert!(!record.is_live(Duration::from_millis(500), 1_500));
    // clock skew backwards keeps the lease live
    assert!(record.is_live(Duration::from_millis(500), 900));
}

#[tokio::test]
async fn test_first_contender_acquires_and_second_is_refused() {
    enable_logger();
    let temp_dir = tempfile::tempdir().unwrap();
    let first = election(temp_dir.path(), 0);
    let second = election(temp_dir.path(), 1);

    assert!(first.try_acquire().await.unwrap());
    assert!(!second.try_acquire().await.unwrap());

    let record = read_lease(first.lease_path()).await.unwrap().unwrap();
    assert_eq!(record.participant_id, 0);
    assert_eq!(record.session_id, first.session_id());
    assert_ne!(first.session_id(), second.session_id());
}

#[tokio::test]
async fn test_expired_lease_is_taken_over_and_old_holder_loses_leadership() {
    let temp_dir = tempfile::tempdir().unwrap();
    let first = election(temp_dir.path(), 0);
    let second = election(temp_dir.path(), 1);

    assert!(first.try_acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(second.try_acquire().await.unwrap());
    match first.renew().await {
        Err(Error::Coordination(CoordinationError::LeadershipLost { session_id, .. })) => {
            assert_eq!(session_id, first.session_id());
        }
        other => panic!("expected leadership lost, got {other:?}"),
    }
}

#[tokio::test]
async fn test_renew_refreshes_timestamp() {
    let temp_dir = tempfile::tempdir().unwrap();
    let leader = election(temp_dir.path(), 0);
    assert!(leader.try_acquire().await.unwrap());
    let before = read_lease(leader.lease_path()).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    leader.renew().await.unwrap();

    let after = read_lease(leader.lease_path()).await.unwrap().unwrap();
    assert!(after.renewed_at_ms > before.renewed_at_ms);
    assert!(after.is_live(Duration::from_millis(300), get_now_as_millis()));
}

#[tokio::test]
async fn test_resign_only_removes_own_lease() {
    let temp_dir = tempfile::tempdir().unwrap();
    let leader = election(temp_dir.path(), 0);
    let bystander = election(temp_dir.path(), 1);
    assert!(leader.try_acquire().await.unwrap());

    bystander.resign().await.unwrap();
    assert!(read_lease(leader.lease_path()).await.unwrap().is_some());

    leader.resign().await.unwrap();
    assert!(read_lease(leader.lease_path()).await.unwrap().is_none());
    assert!(bystander.try_acquire().await.unwrap());
}

#[tokio::test]
async fn test_corrupted_lease_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("dispatcher.lease");
    file_io::write_atomically(&path, b"\x01").await.unwrap();

    assert!(matches!(
        read_lease(&path).await,
        Err(Error::Coordination(CoordinationError::CorruptedLease(_)))
    ));
}
