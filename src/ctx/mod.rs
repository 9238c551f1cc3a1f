// src/ctx/mod.rs

//! Context and rendering layer.
//!
//! - [`shared`] holds the session-scoped context (inputs, env snapshot,
//!   xcom, shared log, renderer).
//! - [`task_ctx`] is the per-task view handed to actions: env overlay,
//!   attempt counters, print helpers.
//! - [`render`] is the restricted template renderer.
//! - [`xcom`] implements the per-task FIFO channels.

pub mod render;
pub mod shared;
pub mod task_ctx;
pub mod xcom;

pub use render::Renderer;
pub use shared::SharedContext;
pub use task_ctx::TaskContext;
pub use xcom::{XcomChannel, XcomMap};
