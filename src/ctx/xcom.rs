// src/ctx/xcom.rs

//! Cross-task value exchange.
//!
//! Each task gets one FIFO channel per session. The engine pushes the
//! action's return value exactly once per successful attempt; readers
//! normally `peek` and must tolerate an empty channel.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::task::TaskName;

/// FIFO of values produced by one task.
#[derive(Debug, Default)]
pub struct XcomChannel {
    queue: Mutex<VecDeque<Value>>,
}

impl XcomChannel {
    /// Append a value.
    pub fn push(&self, value: Value) {
        self.queue.lock().unwrap().push_back(value);
    }

    /// Remove and return the oldest value.
    pub fn pop(&self) -> Option<Value> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Read the oldest value without removing it.
    pub fn peek(&self) -> Option<Value> {
        self.queue.lock().unwrap().front().cloned()
    }

    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn values(&self) -> Vec<Value> {
        self.queue.lock().unwrap().iter().cloned().collect()
    }
}

/// Per-session map of task name to xcom channel.
#[derive(Debug, Default)]
pub struct XcomMap {
    channels: Mutex<HashMap<TaskName, Arc<XcomChannel>>>,
}

impl XcomMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the channel for a task.
    pub fn channel(&self, task: &str) -> Arc<XcomChannel> {
        self.channels
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .clone()
    }

    pub fn push(&self, task: &str, value: Value) {
        self.channel(task).push(value);
    }

    pub fn peek(&self, task: &str) -> Option<Value> {
        // Snapshot read; absent channel counts as empty.
        let channel = self.channels.lock().unwrap().get(task).cloned();
        channel.and_then(|c| c.peek())
    }

    pub fn pop(&self, task: &str) -> Option<Value> {
        let channel = self.channels.lock().unwrap().get(task).cloned();
        channel.and_then(|c| c.pop())
    }

    pub fn clear(&self, task: &str) {
        if let Some(channel) = self.channels.lock().unwrap().get(task) {
            channel.clear();
        }
    }

    /// Full snapshot of all channels, for diagnostics and tests.
    pub fn snapshot(&self) -> BTreeMap<TaskName, Vec<Value>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|(name, channel)| (name.clone(), channel.values()))
            .collect()
    }
}
