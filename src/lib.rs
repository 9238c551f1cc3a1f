// src/lib.rs

//! taskdag: a DAG-based task-automation runtime with readiness
//! supervision.
//!
//! Tasks are declared with dependencies, inputs, env bindings, retry and
//! fallback policies and optional readiness checks; [`run`] /
//! [`run_async`] execute the DAG with correct ordering, parallelism where
//! safe, retries on failure, fallback fan-out on permanent failure, and
//! supervised restart for service-like tasks.

pub mod ctx;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod session;
pub mod task;

use std::collections::HashMap;
use std::fmt::Write as _;

use serde_json::Value;

pub use crate::ctx::{SharedContext, TaskContext};
pub use crate::errors::{Result, TaskdagError};
pub use crate::session::Session;
pub use crate::task::{Task, TaskBuilder};

/// Execute a task DAG, blocking until it finishes.
///
/// Creates a [`Session`] if none is given. `kwargs` override declared
/// input defaults by name.
pub fn run(
    task: &Task,
    session: Option<Session>,
    kwargs: HashMap<String, String>,
) -> Result<Value> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(TaskdagError::from)?;
    runtime.block_on(run_async(task, session, kwargs))
}

/// Awaitable equivalent of [`run`].
pub async fn run_async(
    task: &Task,
    session: Option<Session>,
    kwargs: HashMap<String, String>,
) -> Result<Value> {
    let session = session.unwrap_or_else(|| Session::new(SharedContext::new()));

    graph::validate(task)?;
    session.set_main_task(task);
    session.shared_ctx().populate_inputs(task, &kwargs)?;

    engine::exec_roots(&session).await
}

/// Dry-run-style description of a task's upstream closure: names, edges
/// and the knobs that matter for scheduling. No task is executed.
pub fn describe(task: &Task) -> String {
    let mut tasks = graph::upstream_closure(task);
    tasks.sort_by(|a, b| a.name().cmp(b.name()));

    let mut out = String::new();
    let _ = writeln!(out, "taskdag graph for '{}'", task.name());
    let _ = writeln!(out, "tasks ({}):", tasks.len());

    for t in &tasks {
        let _ = writeln!(out, "  - {}", t.name());
        if !t.description().is_empty() {
            let _ = writeln!(out, "      description: {}", t.description());
        }
        let upstreams: Vec<String> = t.upstreams().iter().map(|u| u.name().to_string()).collect();
        if !upstreams.is_empty() {
            let _ = writeln!(out, "      upstreams: {upstreams:?}");
        }
        if t.retries() > 0 {
            let _ = writeln!(out, "      retries: {}", t.retries());
        }
        if t.is_long_running() {
            let _ = writeln!(
                out,
                "      readiness_checks: {} (monitor: {})",
                t.readiness_checks().len(),
                t.monitor()
            );
        }
        if t.cli_only() {
            let _ = writeln!(out, "      cli_only: true");
        }
    }

    out
}
