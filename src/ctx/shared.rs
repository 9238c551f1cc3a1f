// src/ctx/shared.rs

//! Session-scoped shared context.
//!
//! Holds everything that is common to all tasks of one run: resolved
//! inputs, the process env snapshot, the xcom map, the shared log and the
//! template renderer. There is no process-global state; concurrent
//! sessions each own their context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, TaskdagError};
use crate::task::Task;

use super::render::Renderer;
use super::xcom::XcomMap;

#[derive(Debug)]
struct SharedCtxInner {
    /// Resolved input values, populated once per session.
    input: Mutex<HashMap<String, Value>>,
    /// Process environment snapshot taken at construction.
    env: HashMap<String, String>,
    xcom: Arc<XcomMap>,
    /// Append-only stream of styled lines from all tasks.
    shared_log: Mutex<Vec<String>>,
    renderer: Renderer,
}

/// Cheap, cloneable handle to the session's shared context.
#[derive(Debug, Clone)]
pub struct SharedContext {
    inner: Arc<SharedCtxInner>,
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContext {
    pub fn new() -> Self {
        let xcom = Arc::new(XcomMap::new());
        Self {
            inner: Arc::new(SharedCtxInner {
                input: Mutex::new(HashMap::new()),
                env: std::env::vars().collect(),
                xcom: xcom.clone(),
                shared_log: Mutex::new(Vec::new()),
                renderer: Renderer::new(xcom),
            }),
        }
    }

    pub fn xcom(&self) -> &Arc<XcomMap> {
        &self.inner.xcom
    }

    pub fn renderer(&self) -> &Renderer {
        &self.inner.renderer
    }

    /// Process env snapshot (before any task-level overlay).
    pub fn env(&self) -> &HashMap<String, String> {
        &self.inner.env
    }

    pub fn input(&self, name: &str) -> Option<Value> {
        self.inner.input.lock().unwrap().get(name).cloned()
    }

    pub fn inputs(&self) -> HashMap<String, Value> {
        self.inner.input.lock().unwrap().clone()
    }

    pub fn set_input(&self, name: &str, value: Value) {
        self.inner
            .input
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    /// Append one line to the shared log. Lines never interleave because
    /// each call appends a complete line under the lock.
    pub fn append_log(&self, line: String) {
        self.inner.shared_log.lock().unwrap().push(line);
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.inner.shared_log.lock().unwrap().clone()
    }

    /// Render a template against the resolved inputs and the given
    /// effective env (process snapshot when no overlay applies).
    pub fn render(&self, template: &str, env: &HashMap<String, String>) -> Result<String> {
        let input = self.inputs();
        Ok(self.inner.renderer.render(template, &input, env)?)
    }

    /// Resolve the main task's combined input declarations, in declaration
    /// order. Caller-supplied kwargs win over defaults; defaults are
    /// rendered as templates and may reference inputs resolved earlier.
    ///
    /// A declaration with neither a kwarg nor a default is a
    /// [`TaskdagError::MissingInput`], raised before any action runs.
    pub fn populate_inputs(&self, task: &Task, kwargs: &HashMap<String, String>) -> Result<()> {
        for decl in task.combined_inputs() {
            let raw = match kwargs.get(&decl.name) {
                Some(given) => given.clone(),
                None => match &decl.default {
                    Some(default) => self.render(default, &self.inner.env)?,
                    None => return Err(TaskdagError::MissingInput(decl.name.clone())),
                },
            };

            let value = decl.parse(&raw)?;
            debug!(input = %decl.name, "resolved input");
            self.set_input(&decl.name, value);
        }

        Ok(())
    }
}
