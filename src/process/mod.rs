//! Lifecycle of out-of-process cluster participants.
//!
//! The orchestrator owns every [`ParticipantProcess`] it starts. Handles are
//! owned-resource guards: dropping one kills the OS process, so a scenario that
//! unwinds early never leaks coordinators.
//!
//! After [`ProcessOrchestrator::kill`] any cached leader address is stale and
//! must be re-resolved through the discovery client.

mod launcher;
mod orchestrator;
mod participant;

pub use launcher::*;
pub use orchestrator::*;
pub use participant::*;
