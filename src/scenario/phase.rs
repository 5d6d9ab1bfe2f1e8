use std::fmt;

/// Stages of one recovery scenario, in the only order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScenarioPhase {
    Init,
    ClusterUp,
    WorkloadSubmitted,
    WorkersReady,
    LeaderKilled,
    ReplacementUp,
    WorkloadReleased,
    WorkloadFinished,
    Verified,
    TornDown,
}

impl ScenarioPhase {
    /// Successor in the linear state machine; `TornDown` is final.
    pub fn next(self) -> Option<Self> {
        use ScenarioPhase::*;
        match self {
            Init => Some(ClusterUp),
            ClusterUp => Some(WorkloadSubmitted),
            WorkloadSubmitted => Some(WorkersReady),
            WorkersReady => Some(LeaderKilled),
            LeaderKilled => Some(ReplacementUp),
            ReplacementUp => Some(WorkloadReleased),
            WorkloadReleased => Some(WorkloadFinished),
            WorkloadFinished => Some(Verified),
            Verified => Some(TornDown),
            TornDown => None,
        }
    }

    /// Teardown is reachable from every phase.
    pub fn can_advance_to(
        self,
        target: Self,
    ) -> bool {
        (target == ScenarioPhase::TornDown && self != ScenarioPhase::TornDown) || self.next() == Some(target)
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
