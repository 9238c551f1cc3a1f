#![allow(dead_code)]

//! Fake actions and sinks for driving the engine in tests without real
//! work: counting/flaky actions, a never-returning service action,
//! flag-controlled readiness checks and an in-memory state-log sink.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use taskdag::session::{SessionStateLog, StateLogSink};
use taskdag::task::{Action, ActionFuture};
use taskdag::TaskContext;

/// Counts invocations; fails the first `fail_first` of them, then keeps
/// returning `value`.
pub struct CountingAction {
    pub calls: Arc<AtomicUsize>,
    pub fail_first: usize,
    pub value: Value,
}

impl CountingAction {
    pub fn new(calls: Arc<AtomicUsize>, fail_first: usize, value: Value) -> Self {
        Self {
            calls,
            fail_first,
            value,
        }
    }
}

impl Action for CountingAction {
    fn run(&self, _ctx: TaskContext) -> ActionFuture {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = call < self.fail_first;
        let value = self.value.clone();
        Box::pin(async move {
            if fail {
                Err(anyhow::anyhow!("induced failure on call {call}"))
            } else {
                Ok(value)
            }
        })
    }
}

/// Service-style action: counts launches, then never returns (until
/// cancelled by the engine).
pub struct PendingAction {
    pub launches: Arc<AtomicUsize>,
}

impl PendingAction {
    pub fn new(launches: Arc<AtomicUsize>) -> Self {
        Self { launches }
    }
}

impl Action for PendingAction {
    fn run(&self, _ctx: TaskContext) -> ActionFuture {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        })
    }
}

/// Readiness check controlled by a shared flag: succeeds while `healthy`
/// is true, fails otherwise.
pub struct FlagCheckAction {
    pub healthy: Arc<AtomicBool>,
}

impl FlagCheckAction {
    pub fn new(healthy: Arc<AtomicBool>) -> Self {
        Self { healthy }
    }
}

impl Action for FlagCheckAction {
    fn run(&self, _ctx: TaskContext) -> ActionFuture {
        let ok = self.healthy.load(Ordering::SeqCst);
        Box::pin(async move {
            if ok {
                Ok(Value::String("up".to_string()))
            } else {
                Err(anyhow::anyhow!("service is unhealthy"))
            }
        })
    }
}

/// State-log sink that records every snapshot in memory.
#[derive(Default)]
pub struct MemoryStateLog {
    snapshots: Mutex<Vec<SessionStateLog>>,
}

impl MemoryStateLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshots(&self) -> Vec<SessionStateLog> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SessionStateLog> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateLogSink for MemoryStateLog {
    fn write(&self, snapshot: &SessionStateLog) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}
