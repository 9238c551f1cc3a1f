// src/task/mod.rs

//! Declarative task nodes.
//!
//! A [`Task`] is an immutable description of one unit of work: what it
//! depends on, which inputs and environment it needs, how often to retry,
//! and (for service-like tasks) how readiness is checked. Tasks carry no
//! per-run state; all of that lives in the [`crate::session::Session`].
//!
//! Handles are cheap clones of a shared inner value. Edge lists are the
//! only part that grows after construction (graph wiring via builder
//! methods or the `>>` / `<<` operators). Upstream edges hold strong
//! references while successor edges are weak, so wiring `a >> b` never
//! creates a reference cycle.

pub mod action;
pub mod chain;
pub mod env;
pub mod input;

pub use action::{Action, ActionFuture, FnAction};
pub use env::EnvDecl;
pub use input::{Input, InputKind};

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use console::Color;
use serde_json::Value;

use crate::ctx::TaskContext;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Whether a task should execute at all in a given session.
///
/// `Template` variants are rendered against the task context; a result of
/// "" / "false" / "0" / "no" (case-insensitive) means skip.
#[derive(Debug, Clone)]
pub enum ExecuteCondition {
    Bool(bool),
    Template(String),
}

impl Default for ExecuteCondition {
    fn default() -> Self {
        ExecuteCondition::Bool(true)
    }
}

/// The four dependency lists of a task, as the engine sees them.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    pub upstreams: Vec<Task>,
    pub fallbacks: Vec<Task>,
    pub successors: Vec<Task>,
    pub readiness_checks: Vec<Task>,
}

#[derive(Default)]
struct TaskEdges {
    /// Strong references: a task keeps its upstreams alive.
    upstreams: Vec<Task>,
    /// Weak references: the reverse direction of `upstreams`.
    successors: Vec<Weak<TaskInner>>,
    fallbacks: Vec<Task>,
    readiness_checks: Vec<Task>,
}

struct TaskInner {
    name: TaskName,
    description: String,
    color: Option<Color>,
    icon: Option<String>,
    inputs: Vec<Input>,
    envs: Vec<EnvDecl>,
    action: Option<Box<dyn Action>>,
    execute_condition: ExecuteCondition,
    retries: u32,
    retry_period: Duration,
    check_delay: Duration,
    check_period: Duration,
    failure_threshold: u32,
    check_timeout: Duration,
    monitor: bool,
    cli_only: bool,
    edges: Mutex<TaskEdges>,
}

/// Cheap, cloneable handle to a task node.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("retries", &self.inner.retries)
            .field("monitor", &self.inner.monitor)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn builder(name: &str) -> TaskBuilder {
        TaskBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn color(&self) -> Option<Color> {
        self.inner.color
    }

    pub fn icon(&self) -> Option<&str> {
        self.inner.icon.as_deref()
    }

    pub fn execute_condition(&self) -> &ExecuteCondition {
        &self.inner.execute_condition
    }

    pub fn retries(&self) -> u32 {
        self.inner.retries
    }

    pub fn retry_period(&self) -> Duration {
        self.inner.retry_period
    }

    pub fn check_delay(&self) -> Duration {
        self.inner.check_delay
    }

    pub fn check_period(&self) -> Duration {
        self.inner.check_period
    }

    pub fn failure_threshold(&self) -> u32 {
        self.inner.failure_threshold
    }

    pub fn check_timeout(&self) -> Duration {
        self.inner.check_timeout
    }

    pub fn monitor(&self) -> bool {
        self.inner.monitor
    }

    pub fn cli_only(&self) -> bool {
        self.inner.cli_only
    }

    /// A task with readiness checks is long-running: success means
    /// "entered ready state", not "action returned".
    pub fn is_long_running(&self) -> bool {
        !self.readiness_checks().is_empty()
    }

    pub fn upstreams(&self) -> Vec<Task> {
        self.inner.edges.lock().unwrap().upstreams.clone()
    }

    /// Successors, skipping any whose handles have been dropped.
    pub fn successors(&self) -> Vec<Task> {
        self.inner
            .edges
            .lock()
            .unwrap()
            .successors
            .iter()
            .filter_map(|w| w.upgrade().map(|inner| Task { inner }))
            .collect()
    }

    pub fn fallbacks(&self) -> Vec<Task> {
        self.inner.edges.lock().unwrap().fallbacks.clone()
    }

    pub fn readiness_checks(&self) -> Vec<Task> {
        self.inner.edges.lock().unwrap().readiness_checks.clone()
    }

    pub fn dependencies(&self) -> Dependencies {
        Dependencies {
            upstreams: self.upstreams(),
            fallbacks: self.fallbacks(),
            successors: self.successors(),
            readiness_checks: self.readiness_checks(),
        }
    }

    /// Own env declarations, in declaration order.
    pub fn envs(&self) -> Vec<EnvDecl> {
        self.inner.envs.clone()
    }

    /// Combined input declarations: inherited transitively from upstreams
    /// (depth-first, upstream declarations first), then the task's own.
    /// Order-preserving; the first declaration of a name wins.
    pub fn combined_inputs(&self) -> Vec<Input> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        self.collect_inputs(&mut seen, &mut out, &mut std::collections::HashSet::new());
        out
    }

    fn collect_inputs(
        &self,
        seen: &mut std::collections::HashSet<String>,
        out: &mut Vec<Input>,
        visited: &mut std::collections::HashSet<TaskName>,
    ) {
        if !visited.insert(self.inner.name.clone()) {
            return;
        }
        for up in self.upstreams() {
            up.collect_inputs(seen, out, visited);
        }
        for input in &self.inner.inputs {
            if seen.insert(input.name.clone()) {
                out.push(input.clone());
            }
        }
    }

    /// Run the task's action. Group-only tasks (no action) yield `Null`.
    ///
    /// The engine, not the task, owns retries and status transitions.
    pub async fn exec(&self, ctx: TaskContext) -> anyhow::Result<Value> {
        match &self.inner.action {
            Some(action) => action.run(ctx).await,
            None => Ok(Value::Null),
        }
    }

    /// Register `other` as an upstream of `self` (and `self` as a weak
    /// successor of `other`).
    pub fn add_upstream(&self, other: &Task) {
        self.inner
            .edges
            .lock()
            .unwrap()
            .upstreams
            .push(other.clone());
        other
            .inner
            .edges
            .lock()
            .unwrap()
            .successors
            .push(Arc::downgrade(&self.inner));
    }

    /// Register `other` as a successor of `self`.
    pub fn add_successor(&self, other: &Task) {
        other.add_upstream(self);
    }

    pub fn add_fallback(&self, other: &Task) {
        self.inner
            .edges
            .lock()
            .unwrap()
            .fallbacks
            .push(other.clone());
    }

    pub fn add_readiness_check(&self, other: &Task) {
        self.inner
            .edges
            .lock()
            .unwrap()
            .readiness_checks
            .push(other.clone());
    }

    /// Stable identity of the underlying node, for duplicate detection.
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

/// Builder for [`Task`]; all knobs default to the one-shot, no-retry case.
pub struct TaskBuilder {
    name: TaskName,
    description: String,
    color: Option<Color>,
    icon: Option<String>,
    inputs: Vec<Input>,
    envs: Vec<EnvDecl>,
    action: Option<Box<dyn Action>>,
    execute_condition: ExecuteCondition,
    retries: u32,
    retry_period: Duration,
    check_delay: Duration,
    check_period: Duration,
    failure_threshold: u32,
    check_timeout: Duration,
    monitor: bool,
    cli_only: bool,
    upstreams: Vec<Task>,
    fallbacks: Vec<Task>,
    readiness_checks: Vec<Task>,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            color: None,
            icon: None,
            inputs: Vec::new(),
            envs: Vec::new(),
            action: None,
            execute_condition: ExecuteCondition::default(),
            retries: 0,
            retry_period: Duration::from_secs(0),
            check_delay: Duration::from_millis(300),
            check_period: Duration::from_secs(5),
            failure_threshold: 1,
            check_timeout: Duration::from_secs(60),
            monitor: false,
            cli_only: false,
            upstreams: Vec::new(),
            fallbacks: Vec::new(),
            readiness_checks: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.envs.push(EnvDecl::var(name, value));
        self
    }

    pub fn env_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.envs.push(EnvDecl::file(path));
        self
    }

    pub fn action(mut self, action: Box<dyn Action>) -> Self {
        self.action = Some(action);
        self
    }

    /// Convenience wrapper around [`FnAction`].
    pub fn action_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.action(Box::new(FnAction::new(f)))
    }

    pub fn execute_condition(mut self, condition: bool) -> Self {
        self.execute_condition = ExecuteCondition::Bool(condition);
        self
    }

    pub fn execute_condition_template(mut self, template: &str) -> Self {
        self.execute_condition = ExecuteCondition::Template(template.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_period(mut self, period: Duration) -> Self {
        self.retry_period = period;
        self
    }

    pub fn check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = delay;
        self
    }

    pub fn check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Consecutive failed supervisor cycles before a restart. Clamped to >= 1.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn cli_only(mut self, cli_only: bool) -> Self {
        self.cli_only = cli_only;
        self
    }

    pub fn upstream(mut self, task: &Task) -> Self {
        self.upstreams.push(task.clone());
        self
    }

    pub fn fallback(mut self, task: &Task) -> Self {
        self.fallbacks.push(task.clone());
        self
    }

    pub fn readiness_check(mut self, task: &Task) -> Self {
        self.readiness_checks.push(task.clone());
        self
    }

    pub fn build(self) -> Task {
        let task = Task {
            inner: Arc::new(TaskInner {
                name: self.name,
                description: self.description,
                color: self.color,
                icon: self.icon,
                inputs: self.inputs,
                envs: self.envs,
                action: self.action,
                execute_condition: self.execute_condition,
                retries: self.retries,
                retry_period: self.retry_period,
                check_delay: self.check_delay,
                check_period: self.check_period,
                failure_threshold: self.failure_threshold,
                check_timeout: self.check_timeout,
                monitor: self.monitor,
                cli_only: self.cli_only,
                edges: Mutex::new(TaskEdges::default()),
            }),
        };

        for up in &self.upstreams {
            task.add_upstream(up);
        }
        for fb in &self.fallbacks {
            task.add_fallback(fb);
        }
        for check in &self.readiness_checks {
            task.add_readiness_check(check);
        }

        task
    }
}
