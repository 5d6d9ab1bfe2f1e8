use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

pub(crate) fn get_duration_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Wall-clock milliseconds, comparable across processes on one host
pub(crate) fn get_now_as_millis() -> u64 {
    get_duration_since_epoch().as_millis() as u64
}
