// src/session/status.rs

//! Per-(task, session) status state machine.
//!
//! Flags are monotonic within one attempt cycle:
//! - `ready` implies `completed` or `skipped`
//! - `permanently_failed` implies `failed`
//! - `completed` and `skipped` are mutually exclusive
//!
//! A supervisor-initiated restart calls [`Status::reset`], which clears the
//! flags but preserves history. The internal `claimed` bit backs the
//! at-most-one-in-flight guarantee and never appears in the state log.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    Started,
    Completed,
    Skipped,
    Ready,
    Failed,
    PermanentlyFailed,
    Terminated,
    Reset,
}

/// One history entry: which flag was set, and when.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub flag: StatusFlag,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StatusInner {
    claimed: bool,
    started: bool,
    completed: bool,
    skipped: bool,
    ready: bool,
    failed: bool,
    permanently_failed: bool,
    terminated: bool,
    history: Vec<StatusEvent>,
}

impl StatusInner {
    fn record(&mut self, flag: StatusFlag) {
        self.history.push(StatusEvent {
            flag,
            ts: Utc::now(),
        });
    }
}

#[derive(Debug, Default)]
pub struct Status {
    inner: Mutex<StatusInner>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim this task for execution. Returns `false` if some
    /// other chain already owns it in this attempt cycle.
    pub fn try_claim(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.claimed {
            return false;
        }
        inner.claimed = true;
        true
    }

    pub fn mark_started(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.started {
            inner.started = true;
            inner.record(StatusFlag::Started);
        }
    }

    pub fn mark_completed(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.skipped {
            warn!("ignoring completed: status is already skipped");
            return;
        }
        if !inner.completed {
            inner.completed = true;
            inner.record(StatusFlag::Completed);
        }
    }

    pub fn mark_skipped(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.completed {
            warn!("ignoring skipped: status is already completed");
            return;
        }
        if !inner.skipped {
            inner.skipped = true;
            inner.record(StatusFlag::Skipped);
        }
    }

    pub fn mark_ready(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !(inner.completed || inner.skipped) {
            warn!("ignoring ready: status is neither completed nor skipped");
            return;
        }
        if !inner.ready {
            inner.ready = true;
            inner.record(StatusFlag::Ready);
        }
    }

    pub fn mark_failed(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failed = true;
        // Every failed attempt is recorded, not just the first.
        inner.record(StatusFlag::Failed);
    }

    pub fn mark_permanently_failed(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.failed {
            inner.failed = true;
            inner.record(StatusFlag::Failed);
        }
        if !inner.permanently_failed {
            inner.permanently_failed = true;
            inner.record(StatusFlag::PermanentlyFailed);
        }
    }

    pub fn mark_terminated(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.terminated {
            inner.terminated = true;
            inner.record(StatusFlag::Terminated);
        }
    }

    /// Clear all per-cycle flags, preserving history.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.claimed = false;
        inner.started = false;
        inner.completed = false;
        inner.skipped = false;
        inner.ready = false;
        inner.failed = false;
        inner.permanently_failed = false;
        inner.record(StatusFlag::Reset);
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().unwrap().started
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().unwrap().completed
    }

    pub fn is_skipped(&self) -> bool {
        self.inner.lock().unwrap().skipped
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().ready
    }

    pub fn is_failed(&self) -> bool {
        self.inner.lock().unwrap().failed
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.inner.lock().unwrap().permanently_failed
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock().unwrap().terminated
    }

    /// Number of times the given flag appears in history.
    pub fn count_flag(&self, flag: StatusFlag) -> usize {
        self.inner
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|e| e.flag == flag)
            .count()
    }

    pub fn history(&self) -> Vec<StatusEvent> {
        self.inner.lock().unwrap().history.clone()
    }
}
