use std::time::Duration;

use crate::utils::deadline::Deadline;

#[tokio::test(start_paused = true)]
async fn test_time_left_decreases_and_saturates() {
    let deadline = Deadline::from_now(Duration::from_secs(2));
    assert_eq!(deadline.time_left(), Duration::from_secs(2));

    tokio::time::advance(Duration::from_millis(1500)).await;
    assert_eq!(deadline.time_left(), Duration::from_millis(500));
    assert!(!deadline.is_overdue());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(deadline.time_left(), Duration::ZERO);
    assert!(deadline.is_overdue());
}
