// src/task/action.rs

//! Pluggable unit-of-work abstraction.
//!
//! The engine talks to an [`Action`] instead of a concrete work function.
//! Domain-specific task types (shell commands, HTTP calls, ...) implement
//! this trait; tests and small scripts can use [`FnAction`] to wrap an
//! async closure without defining a new type.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::ctx::TaskContext;

/// Boxed future returned by [`Action::run`].
pub type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Trait abstracting the work a task performs.
///
/// The engine owns the whole lifecycle around the action: retries, status
/// transitions, xcom pushes and readiness. Implementations just do the work
/// and return a value (which becomes the task's xcom output) or an error
/// (which counts as one failed attempt).
pub trait Action: Send + Sync {
    fn run(&self, ctx: TaskContext) -> ActionFuture;
}

/// Adapter turning an async closure into an [`Action`].
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Action for FnAction<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn run(&self, ctx: TaskContext) -> ActionFuture {
        Box::pin((self.f)(ctx))
    }
}
