// src/engine/mod.rs

//! Execution engine.
//!
//! This module ties together:
//! - root discovery over the main task's upstream closure
//! - chain walking (task, then successors, concurrently)
//! - action execution under the retry policy
//! - readiness gathering for service-like tasks
//! - the supervisor that re-checks readiness and restarts on degradation
//!
//! The engine keeps no state of its own; everything mutable is reachable
//! from the [`crate::session::Session`] it is handed. [`exec`] contains
//! the chain/retry/readiness logic, [`supervisor`] the monitoring loop.

pub mod exec;
pub mod supervisor;

pub use exec::{exec_chain, exec_roots};
