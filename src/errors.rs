// src/errors.rs

//! Crate-wide error type and `Result` alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in task DAG: {0}")]
    DagCycle(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Template rendering error: {0}")]
    RenderError(#[from] minijinja::Error),

    #[error("task '{task}' failed permanently after {attempts} attempt(s): {source}")]
    PermanentFailure {
        task: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("readiness checks for task '{task}' did not succeed: {reason}")]
    ReadinessFailed { task: String, reason: String },

    #[error("execution cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskdagError {
    /// Name of the task this error is attributed to, if any.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            TaskdagError::PermanentFailure { task, .. } => Some(task),
            TaskdagError::ReadinessFailed { task, .. } => Some(task),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskdagError>;
