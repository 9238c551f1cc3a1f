// tests/graph_validation.rs

use std::collections::HashMap;

use taskdag::{TaskdagError, describe, run_async};
use taskdag_test_utils::builders::value_task;
use taskdag_test_utils::init_tracing;

/// Cyclic upstream edges are rejected before any action runs.
#[tokio::test]
async fn cyclic_dag_is_rejected() {
    init_tracing();

    let a = value_task("A", "a");
    let b = value_task("B", "b");
    a.add_upstream(&b);
    b.add_upstream(&a);

    let result = run_async(&a, None, HashMap::new()).await;
    assert!(matches!(result, Err(TaskdagError::DagCycle(_))));
}

/// A task cannot depend on itself.
#[tokio::test]
async fn self_upstream_is_rejected() {
    init_tracing();

    let a = value_task("A", "a");
    a.add_upstream(&a);

    let result = run_async(&a, None, HashMap::new()).await;
    assert!(matches!(result, Err(TaskdagError::ConfigError(_))));
}

/// Two distinct tasks sharing one name are a configuration error.
#[tokio::test]
async fn duplicate_task_names_are_rejected() {
    init_tracing();

    let x1 = value_task("X", "first");
    let x2 = value_task("X", "second");
    let main = value_task("main", "m");
    main.add_upstream(&x1);
    main.add_upstream(&x2);

    let result = run_async(&main, None, HashMap::new()).await;
    assert!(matches!(result, Err(TaskdagError::ConfigError(_))));
}

/// `describe` lists the upstream closure without executing anything.
#[test]
fn describe_lists_the_graph() {
    let a = value_task("A", "a");
    let b = taskdag::Task::builder("B").retries(2).upstream(&a).build();

    let out = describe(&b);
    assert!(out.contains("- A"));
    assert!(out.contains("- B"));
    assert!(out.contains("retries: 2"));
    assert!(out.contains(r#"upstreams: ["A"]"#));
}
