// src/session/state_log.rs

//! Immutable session state snapshots and the sink they are written to.
//!
//! The snapshot is a pure function of session state at call time; the
//! background logger writes one every 100 ms plus one initial and one
//! final snapshot. The sink is pluggable so tests can capture snapshots
//! in memory instead of scraping log output.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use super::status::StatusEvent;

/// Per-task slice of a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStateLog {
    pub started: bool,
    pub completed: bool,
    pub ready: bool,
    pub skipped: bool,
    pub failed: bool,
    pub permanently_failed: bool,
    pub history: Vec<StatusEvent>,
}

/// Full session snapshot, serializable to the stable JSON shape.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStateLog {
    pub session: String,
    pub main_task: Option<String>,
    pub terminated: bool,
    pub tasks: BTreeMap<String, TaskStateLog>,
}

/// Where session snapshots go.
///
/// Production uses [`TracingStateLog`]; tests can provide their own
/// implementation that records snapshots for assertions.
pub trait StateLogSink: Send + Sync {
    fn write(&self, snapshot: &SessionStateLog);
}

/// Default sink: one JSON line per snapshot on the tracing stream.
#[derive(Debug, Default)]
pub struct TracingStateLog;

impl StateLogSink for TracingStateLog {
    fn write(&self, snapshot: &SessionStateLog) {
        match serde_json::to_string(snapshot) {
            Ok(json) => trace!(session = %snapshot.session, "state: {json}"),
            Err(err) => trace!(session = %snapshot.session, error = %err, "state snapshot serialization failed"),
        }
    }
}
