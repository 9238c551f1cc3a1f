// src/ctx/task_ctx.rs

//! Per-task view over the shared context.
//!
//! Adds the task's own env overlay (task wins over process env), the
//! current attempt counters, and styled print helpers that write through
//! the shared log.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::errors::Result;
use crate::task::env::parse_env_file;
use crate::task::{EnvDecl, Task, TaskName};

use super::shared::SharedContext;
use super::xcom::XcomMap;

#[derive(Debug, Clone)]
pub struct TaskContext {
    shared: SharedContext,
    task_name: TaskName,
    color: Option<console::Color>,
    icon: Option<String>,
    env_decls: Vec<EnvDecl>,
    attempt: u32,
    max_attempt: u32,
}

impl TaskContext {
    pub fn new(shared: SharedContext, task: &Task) -> Self {
        Self {
            shared,
            task_name: task.name().to_string(),
            color: task.color(),
            icon: task.icon().map(str::to_string),
            env_decls: task.envs(),
            attempt: 0,
            max_attempt: task.retries() + 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32, max_attempt: u32) -> Self {
        self.attempt = attempt;
        self.max_attempt = max_attempt;
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Zero-based attempt number for the current action invocation.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempt(&self) -> u32 {
        self.max_attempt
    }

    pub fn shared(&self) -> &SharedContext {
        &self.shared
    }

    pub fn input(&self, name: &str) -> Option<Value> {
        self.shared.input(name)
    }

    pub fn xcom(&self) -> Arc<XcomMap> {
        self.shared.xcom().clone()
    }

    /// Effective environment: process snapshot overlaid with the task's
    /// declarations in order (task wins). `Var` values are rendered as
    /// templates against the overlay built so far; file bundles are taken
    /// verbatim.
    pub fn env(&self) -> Result<HashMap<String, String>> {
        let mut env = self.shared.env().clone();

        for decl in &self.env_decls {
            match decl {
                EnvDecl::Var { name, value } => {
                    let rendered = self.shared.render(value, &env)?;
                    env.insert(name.clone(), rendered);
                }
                EnvDecl::File { path } => {
                    let contents = std::fs::read_to_string(path)?;
                    for (name, value) in parse_env_file(&contents, path)? {
                        env.insert(name, value);
                    }
                }
            }
        }

        Ok(env)
    }

    /// Render a template against inputs, the effective env and live xcom.
    pub fn render(&self, template: &str) -> Result<String> {
        let env = self.env()?;
        self.shared.render(template, &env)
    }

    /// Write a styled line to the shared log and the tracing stream.
    pub fn print(&self, msg: &str) {
        let header = match &self.icon {
            Some(icon) => format!("{icon} {}", self.task_name),
            None => self.task_name.clone(),
        };
        let header = match self.color {
            Some(color) => console::style(header).fg(color).to_string(),
            None => header,
        };

        self.shared.append_log(format!("{header} | {msg}"));
        info!(task = %self.task_name, "{msg}");
    }
}
