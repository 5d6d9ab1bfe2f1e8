//! The paced distributed computation used to observe recovery.
//!
//! `1..=n` is spread round-robin over every map subtask, summed, and the sum
//! is checked against `n(n+1)/2`. Map subtasks announce themselves with
//! `ready_<i>` markers and crawl until the driver signals `proceed`, which
//! keeps the job mid-flight while the leader is killed.

mod executor;
mod harness;
mod operators;

pub use executor::*;
pub use harness::*;
pub use operators::*;
