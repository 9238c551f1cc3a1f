#![allow(dead_code)]

//! Task builders to simplify test setup.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use taskdag::Task;

/// A task whose action returns a fixed string value.
pub fn value_task(name: &str, value: &str) -> Task {
    let value = value.to_string();
    Task::builder(name)
        .action_fn(move |_ctx| {
            let value = value.clone();
            async move { Ok(Value::String(value)) }
        })
        .build()
}

/// A task whose action returns the task's own name.
pub fn named_value_task(name: &str) -> Task {
    value_task(name, name)
}

/// A task whose action always fails.
pub fn always_failing_task(name: &str, retries: u32) -> Task {
    let name_owned = name.to_string();
    Task::builder(name)
        .retries(retries)
        .action_fn(move |_ctx| {
            let name = name_owned.clone();
            async move { Err(anyhow::anyhow!("task '{name}' always fails")) }
        })
        .build()
}

/// A task that records `start:<name>` / `end:<name>` events into the given
/// log and returns its own name. Useful for asserting scheduling order.
pub fn recording_task(name: &str, events: Arc<Mutex<Vec<String>>>) -> Task {
    let name_owned = name.to_string();
    Task::builder(name)
        .action_fn(move |_ctx| {
            let name = name_owned.clone();
            let events = events.clone();
            async move {
                events.lock().unwrap().push(format!("start:{name}"));
                tokio::task::yield_now().await;
                events.lock().unwrap().push(format!("end:{name}"));
                Ok(Value::String(name))
            }
        })
        .build()
}
