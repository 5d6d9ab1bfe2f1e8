use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::constants::PROCEED_MARKER;
use crate::constants::READY_MARKER_PREFIX;
use crate::test_utils::enable_logger;
use crate::utils::deadline::Deadline;
use crate::Error;

#[tokio::test]
async fn test_signal_twice_leaves_a_single_marker() {
    enable_logger();
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSignalStore::create(temp_dir.path()).await.unwrap();

    store.signal(PROCEED_MARKER).await.unwrap();
    store.signal(PROCEED_MARKER).await.unwrap();

    assert!(store.exists(PROCEED_MARKER).await.unwrap());
    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() == PROCEED_MARKER)
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_concurrent_signals_for_the_same_marker_succeed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSignalStore::create(temp_dir.path()).await.unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.signal(&ready_marker(0)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.count(READY_MARKER_PREFIX).await.unwrap(), 1);
}

#[tokio::test]
async fn test_count_only_matches_prefix() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSignalStore::create(temp_dir.path()).await.unwrap();

    store.signal(&ready_marker(0)).await.unwrap();
    store.signal(&ready_marker(1)).await.unwrap();
    store.signal(&finish_marker(0)).await.unwrap();
    store.signal(PROCEED_MARKER).await.unwrap();

    assert_eq!(store.count("ready_").await.unwrap(), 2);
    assert_eq!(store.count("finish_").await.unwrap(), 1);
}

#[tokio::test]
async fn test_count_of_missing_directory_is_zero() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSignalStore::new(temp_dir.path().join("not-yet-created"));

    assert_eq!(store.count("ready_").await.unwrap(), 0);
}

#[tokio::test]
async fn test_await_markers_accepts_non_contiguous_indices_in_any_order() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSignalStore::create(temp_dir.path()).await.unwrap());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for index in [7, 2, 11, 5] {
                tokio::time::sleep(Duration::from_millis(20)).await;
                store.signal(&ready_marker(index)).await.unwrap();
            }
        })
    };

    let found = store
        .await_markers(
            "ready_",
            4,
            Duration::from_millis(10),
            Deadline::from_now(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert_eq!(found, 4);
    writer.await.unwrap();
}

#[tokio::test]
async fn test_await_markers_times_out_naming_the_prefix() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSignalStore::create(temp_dir.path()).await.unwrap();
    store.signal(&finish_marker(3)).await.unwrap();

    let result = store
        .await_markers(
            "finish_",
            2,
            Duration::from_millis(10),
            Deadline::from_now(Duration::from_millis(100)),
        )
        .await;

    match result {
        Err(Error::Timeout {
            stage,
            last_observed,
            ..
        }) => {
            assert!(stage.contains("finish_"));
            assert_eq!(last_observed.as_deref(), Some("1"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_marker_names_are_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSignalStore::create(temp_dir.path()).await.unwrap();

    for name in ["", "../escape", ".hidden", "a/b", "ready 1"] {
        assert!(matches!(store.signal(name).await, Err(Error::InvalidMarker(_))));
    }
}

#[test]
fn test_marker_names() {
    assert_eq!(ready_marker(3), "ready_3");
    assert_eq!(finish_marker(0), "finish_0");
}
