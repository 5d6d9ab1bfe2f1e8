use std::time::Duration;

use super::*;
use crate::config::CoordinationConfig;
use crate::discovery::LeaderRetrievalService;
use crate::utils::deadline::Deadline;

#[tokio::test]
async fn test_create_lays_out_directories_and_cleanup_removes_them() {
    let temp_dir = tempfile::tempdir().unwrap();
    let ha_dir = temp_dir.path().join("ha");
    let services = HighAvailabilityServices::create(CoordinationConfig {
        ha_dir: ha_dir.clone(),
        ..Default::default()
    })
    .await
    .unwrap();

    assert!(ha_dir.join("leader").is_dir());
    assert!(ha_dir.join("jobs").is_dir());
    assert_eq!(services.lease_path(), ha_dir.join("leader").join("dispatcher.lease"));
    assert_eq!(services.job_store().dir(), ha_dir.join("jobs"));

    services.close_and_cleanup_all_data().await.unwrap();
    assert!(!ha_dir.exists());
    // second cleanup is a no-op
    services.close_and_cleanup_all_data().await.unwrap();
}

#[tokio::test]
async fn test_election_and_retrieval_share_the_lease() {
    let temp_dir = tempfile::tempdir().unwrap();
    let services = HighAvailabilityServices::create(CoordinationConfig {
        ha_dir: temp_dir.path().to_path_buf(),
        settle_delay_ms: 10,
        retrieval_poll_interval_ms: 20,
        ..Default::default()
    })
    .await
    .unwrap();

    let election = services.leader_election(4, "127.0.0.1:4444");
    assert!(election.try_acquire().await.unwrap());

    let retrieval = services.leader_retrieval();
    let mut listener = retrieval.start().unwrap();
    let leader = listener
        .wait_for_leader(Deadline::from_now(Duration::from_secs(5)))
        .await
        .unwrap();
    retrieval.stop();

    assert_eq!(leader.participant_id, 4);
    assert_eq!(leader.address, "127.0.0.1:4444");
    assert_eq!(leader.session_id, election.session_id());
}
