// src/session/mod.rs

//! Session: the ownership root for one run.
//!
//! Everything mutable during a run hangs off the session: the task
//! registry, the status map, the xcom map (via the shared context),
//! deferred work and the cancellation token. All of it is destroyed when
//! the session ends; a task may participate in at most one session at a
//! time.
//!
//! - [`status`] is the per-task flag state machine.
//! - [`state_log`] defines snapshots and the pluggable sink.

pub mod state_log;
pub mod status;

pub use state_log::{SessionStateLog, StateLogSink, TaskStateLog, TracingStateLog};
pub use status::{Status, StatusEvent, StatusFlag};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ctx::SharedContext;
use crate::graph;
use crate::task::{Task, TaskName};

struct SessionInner {
    name: String,
    shared: SharedContext,
    main_task: Mutex<Option<Task>>,
    registry: Mutex<HashMap<TaskName, Task>>,
    statuses: Mutex<HashMap<TaskName, Arc<Status>>>,
    /// Deferred work awaited at the end of the run.
    deferred: Mutex<Vec<JoinHandle<()>>>,
    /// Abort handles for all deferred work, kept separately so termination
    /// can cancel handles already taken out of `deferred` for joining.
    deferred_aborts: Mutex<Vec<AbortHandle>>,
    /// Currently running action coroutine per task, for supervisor
    /// restarts and termination cleanup.
    actions: Mutex<HashMap<TaskName, AbortHandle>>,
    terminated: AtomicBool,
    cancel: CancellationToken,
    sink: Arc<dyn StateLogSink>,
}

/// Cheap, cloneable handle to one run's session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(shared: SharedContext) -> Self {
        Self::with_sink(shared, Arc::new(TracingStateLog))
    }

    pub fn with_sink(shared: SharedContext, sink: Arc<dyn StateLogSink>) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let name = format!("session-{}", &id[..8]);
        Self {
            inner: Arc::new(SessionInner {
                name,
                shared,
                main_task: Mutex::new(None),
                registry: Mutex::new(HashMap::new()),
                statuses: Mutex::new(HashMap::new()),
                deferred: Mutex::new(Vec::new()),
                deferred_aborts: Mutex::new(Vec::new()),
                actions: Mutex::new(HashMap::new()),
                terminated: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                sink,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn shared_ctx(&self) -> &SharedContext {
        &self.inner.shared
    }

    pub fn set_main_task(&self, task: &Task) {
        *self.inner.main_task.lock().unwrap() = Some(task.clone());
        self.register_task(task);
    }

    pub fn main_task(&self) -> Option<Task> {
        self.inner.main_task.lock().unwrap().clone()
    }

    /// Register a task and everything reachable from it. Idempotent:
    /// registering the same task twice leaves the registry and the status
    /// map unchanged.
    pub fn register_task(&self, task: &Task) {
        for t in graph::reachable(task) {
            let mut registry = self.inner.registry.lock().unwrap();
            if registry.contains_key(t.name()) {
                continue;
            }
            debug!(session = %self.inner.name, task = %t.name(), "registered task");
            registry.insert(t.name().to_string(), t.clone());
            drop(registry);
            self.status(t.name());
        }
    }

    pub fn task(&self, name: &str) -> Option<Task> {
        self.inner.registry.lock().unwrap().get(name).cloned()
    }

    pub fn task_names(&self) -> Vec<TaskName> {
        let mut names: Vec<TaskName> = self.inner.registry.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Status entry for a task, created on first use.
    pub fn status(&self, name: &str) -> Arc<Status> {
        self.inner
            .statuses
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Register deferred work, to be awaited by [`Session::wait_deferred`]
    /// and cancelled on termination.
    pub fn defer(&self, handle: JoinHandle<()>) {
        self.inner
            .deferred_aborts
            .lock()
            .unwrap()
            .push(handle.abort_handle());
        self.inner.deferred.lock().unwrap().push(handle);
    }

    /// Await all deferred work. Drains repeatedly because supervisors may
    /// register more work (restarted actions) while this is joining.
    pub async fn wait_deferred(&self) {
        loop {
            let handle = self.inner.deferred.lock().unwrap().pop();
            match handle {
                Some(h) => {
                    if let Err(err) = h.await {
                        if !err.is_cancelled() {
                            error!(session = %self.inner.name, error = %err, "deferred work panicked");
                        }
                    }
                }
                None => break,
            }
        }
    }

    /// Remember the running action coroutine for a task (replacing any
    /// previous one).
    pub fn track_action(&self, name: &str, handle: AbortHandle) {
        self.inner
            .actions
            .lock()
            .unwrap()
            .insert(name.to_string(), handle);
    }

    /// Abort the tracked action coroutine of a task, if any.
    pub fn abort_action(&self, name: &str) -> bool {
        match self.inner.actions.lock().unwrap().remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Ask the run to shut down. Safe to call from anywhere (signal
    /// handlers, observers, tests); the engine performs the actual
    /// termination cleanup.
    pub fn request_termination(&self) {
        self.inner.cancel.cancel();
    }

    /// Wire SIGINT to [`Session::request_termination`].
    pub fn terminate_on_ctrl_c(&self) {
        let session = self.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for Ctrl+C");
                return;
            }
            info!(session = %session.name(), "interrupt received; requesting termination");
            session.request_termination();
        });
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Terminate the session: cancel in-flight work and flag statuses that
    /// were interrupted mid-run. Idempotent.
    pub(crate) fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.cancel.cancel();

        for (_name, handle) in self.inner.actions.lock().unwrap().drain() {
            handle.abort();
        }
        for handle in self.inner.deferred_aborts.lock().unwrap().drain(..) {
            handle.abort();
        }

        for (name, status) in self.inner.statuses.lock().unwrap().iter() {
            if status.is_started() && !status.is_ready() && !status.is_permanently_failed() {
                debug!(session = %self.inner.name, task = %name, "task interrupted by termination");
                status.mark_terminated();
            }
        }

        info!(session = %self.inner.name, "session terminated");
    }

    /// Immutable snapshot of session state, for observers.
    pub fn as_state_log(&self) -> SessionStateLog {
        let tasks = self
            .inner
            .statuses
            .lock()
            .unwrap()
            .iter()
            .map(|(name, status)| {
                (
                    name.clone(),
                    TaskStateLog {
                        started: status.is_started(),
                        completed: status.is_completed(),
                        ready: status.is_ready(),
                        skipped: status.is_skipped(),
                        failed: status.is_failed(),
                        permanently_failed: status.is_permanently_failed(),
                        history: status.history(),
                    },
                )
            })
            .collect();

        SessionStateLog {
            session: self.inner.name.clone(),
            main_task: self.main_task().map(|t| t.name().to_string()),
            terminated: self.is_terminated(),
            tasks,
        }
    }

    /// Write one snapshot to the configured sink.
    pub fn write_state_log(&self) {
        self.inner.sink.write(&self.as_state_log());
    }
}
