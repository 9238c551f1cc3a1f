// src/graph.rs

//! Task-graph traversal and validation.
//!
//! Tasks reference each other directly, so there is no separate graph
//! structure to keep in sync; this module walks the edges. Validation
//! (duplicate names, cycles) runs once per session before any action,
//! using a petgraph toposort over the upstream edges.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{Result, TaskdagError};
use crate::task::{Task, TaskName};

/// All tasks reachable from `start` over every edge kind (upstreams,
/// successors, fallbacks, readiness checks), in discovery order.
pub fn reachable(start: &Task) -> Vec<Task> {
    let mut visited: HashSet<TaskName> = HashSet::new();
    let mut out = Vec::new();
    let mut stack = vec![start.clone()];

    while let Some(task) = stack.pop() {
        if !visited.insert(task.name().to_string()) {
            continue;
        }

        let deps = task.dependencies();
        stack.extend(deps.upstreams);
        stack.extend(deps.successors);
        stack.extend(deps.fallbacks);
        stack.extend(deps.readiness_checks);

        out.push(task);
    }

    out
}

/// Transitive upstream closure of `main`, including `main` itself.
pub fn upstream_closure(main: &Task) -> Vec<Task> {
    let mut visited: HashSet<TaskName> = HashSet::new();
    let mut out = Vec::new();
    let mut stack = vec![main.clone()];

    while let Some(task) = stack.pop() {
        if !visited.insert(task.name().to_string()) {
            continue;
        }
        stack.extend(task.upstreams());
        out.push(task);
    }

    out
}

/// Root tasks of `main`'s closure: tasks with no upstreams of their own.
pub fn roots(main: &Task) -> Vec<Task> {
    let roots: Vec<Task> = upstream_closure(main)
        .into_iter()
        .filter(|t| t.upstreams().is_empty())
        .collect();

    debug!(
        main = %main.name(),
        roots = ?roots.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
        "computed DAG roots"
    );

    roots
}

/// Validate the graph reachable from `main`.
///
/// - every name must map to exactly one node (no duplicate names)
/// - the upstream relation must be acyclic
///
/// Raised before any action runs; a failure here is a [`TaskdagError::ConfigError`]
/// or [`TaskdagError::DagCycle`].
pub fn validate(main: &Task) -> Result<()> {
    let tasks = reachable(main);

    let mut by_name: HashMap<String, usize> = HashMap::new();
    for task in &tasks {
        if let Some(existing) = by_name.insert(task.name().to_string(), task.node_id()) {
            if existing != task.node_id() {
                return Err(TaskdagError::ConfigError(format!(
                    "duplicate task name '{}' in graph",
                    task.name()
                )));
            }
        }
    }

    for task in &tasks {
        for up in task.upstreams() {
            if up.name() == task.name() {
                return Err(TaskdagError::ConfigError(format!(
                    "task '{}' cannot be its own upstream",
                    task.name()
                )));
            }
        }
    }

    // Edge direction: upstream -> task. A toposort fails iff there is a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in &tasks {
        graph.add_node(task.name());
    }

    let edges: Vec<(String, String)> = tasks
        .iter()
        .flat_map(|task| {
            task.upstreams()
                .into_iter()
                .map(|up| (up.name().to_string(), task.name().to_string()))
                .collect::<Vec<_>>()
        })
        .collect();

    for (up, down) in &edges {
        graph.add_edge(up.as_str(), down.as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskdagError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}
