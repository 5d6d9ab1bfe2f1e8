// -
// Coordination directory markers

/// Written by every map subtask on its first record
pub const READY_MARKER_PREFIX: &str = "ready_";
/// Written by a verification subtask after the result checked out
pub const FINISH_MARKER_PREFIX: &str = "finish_";
/// Single signal that releases the paced map stage
pub const PROCEED_MARKER: &str = "proceed";

// -
// HA directory layout

pub(crate) const LEADER_DIR: &str = "leader";
pub(crate) const JOBS_DIR: &str = "jobs";
pub(crate) const LEASE_SUFFIX: &str = "lease";

/// Leadership role contended for by coordinator processes
pub const DISPATCHER_ROLE: &str = "dispatcher";

// -
// Scenario run directory layout

pub(crate) const RUN_DIR_PREFIX: &str = "run-";
pub(crate) const HA_DIR_NAME: &str = "ha";
pub(crate) const COORDINATE_DIR_NAME: &str = "coordinate";
pub(crate) const SNAPSHOT_DIR_NAME: &str = "participants";

/// Environment variable carrying the config snapshot path into a participant
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
/// Prefix of environment overrides, e.g. `FAILOVER__COORDINATOR__NODE_ID`
pub const ENV_PREFIX: &str = "FAILOVER";

/// Lines of participant output kept for post-mortem printing
pub(crate) const PROCESS_LOG_CAPACITY: usize = 2000;
