//! Reference cluster driven by the harness.
//!
//! Coordinators run as separate OS processes (see the `failover-coordinator`
//! binary); workers run in-process. The harness itself only talks to the
//! cluster through [`ClusterClient`] and leader discovery.

mod client;
mod coordinator;
mod protocol;
mod worker;

pub use client::*;
pub use coordinator::Coordinator;
pub use protocol::*;
pub use worker::*;
