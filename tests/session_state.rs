// tests/session_state.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use taskdag::ctx::XcomChannel;
use taskdag::session::StateLogSink;
use taskdag::{SharedContext, Session, run_async};
use taskdag_test_utils::builders::value_task;
use taskdag_test_utils::fake_actions::MemoryStateLog;
use taskdag_test_utils::init_tracing;

/// Registering the same task twice leaves the task set and the status map
/// unchanged.
#[test]
fn register_task_is_idempotent() {
    let a = value_task("A", "a");
    let b = value_task("B", "b");
    let _ = a.clone() >> b.clone();

    let session = Session::new(SharedContext::new());
    session.register_task(&b);
    let names_first = session.task_names();
    let status_first = session.status("A");

    session.register_task(&b);
    session.register_task(&a);

    assert_eq!(session.task_names(), names_first);
    assert!(
        Arc::ptr_eq(&status_first, &session.status("A")),
        "status entries must survive re-registration"
    );
}

/// The snapshot is a pure function of session state at call time.
#[test]
fn state_log_snapshot_is_pure() {
    let a = value_task("A", "a");
    let session = Session::new(SharedContext::new());
    session.set_main_task(&a);
    session.status("A").mark_started();

    let one = serde_json::to_value(session.as_state_log()).unwrap();
    let two = serde_json::to_value(session.as_state_log()).unwrap();
    assert_eq!(one, two);
}

/// The state logger writes an initial and a final snapshot through the
/// configured sink, and the snapshot has the stable JSON shape.
#[tokio::test]
async fn state_log_sink_receives_snapshots() {
    init_tracing();

    let a = value_task("A", "a");
    let sink = MemoryStateLog::new();
    let session = Session::with_sink(SharedContext::new(), sink.clone());

    run_async(&a, Some(session.clone()), HashMap::new())
        .await
        .expect("run should succeed");

    let snapshots = sink.snapshots();
    assert!(snapshots.len() >= 2, "initial + final snapshot at minimum");
    assert!(!snapshots.first().unwrap().terminated);

    let last = sink.last().unwrap();
    assert!(last.terminated);
    assert_eq!(last.main_task.as_deref(), Some("A"));

    let value = serde_json::to_value(&last).unwrap();
    assert!(value["session"].as_str().unwrap().starts_with("session-"));
    let task = &value["tasks"]["A"];
    assert_eq!(task["started"], json!(true));
    assert_eq!(task["completed"], json!(true));
    assert_eq!(task["ready"], json!(true));
    assert_eq!(task["skipped"], json!(false));
    assert_eq!(task["failed"], json!(false));
    assert_eq!(task["permanently_failed"], json!(false));

    let flags: Vec<&str> = task["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["flag"].as_str().unwrap())
        .collect();
    assert_eq!(flags, vec!["started", "completed", "ready"]);
    assert!(task["history"][0]["ts"].is_string(), "timestamps are ISO-8601 strings");
}

/// Manual snapshots work without a run, and a custom sink sees them.
#[test]
fn write_state_log_goes_through_the_sink() {
    let a = value_task("A", "a");
    let sink = MemoryStateLog::new();
    let session = Session::with_sink(SharedContext::new(), sink.clone());
    session.set_main_task(&a);

    session.write_state_log();
    let dyn_sink: Arc<dyn StateLogSink> = sink.clone();
    dyn_sink.write(&session.as_state_log());

    assert_eq!(sink.len(), 2);
}

/// Xcom channel semantics: push appends, pop removes the oldest, peek
/// reads without removing, clear empties.
#[test]
fn xcom_channel_is_a_fifo() {
    let channel = XcomChannel::default();
    assert!(channel.is_empty());
    assert_eq!(channel.peek(), None);

    channel.push(json!(1));
    channel.push(json!(2));
    assert_eq!(channel.len(), 2);
    assert_eq!(channel.peek(), Some(json!(1)));
    assert_eq!(channel.len(), 2, "peek must not remove");

    assert_eq!(channel.pop(), Some(json!(1)));
    assert_eq!(channel.pop(), Some(json!(2)));
    assert_eq!(channel.pop(), None);

    channel.push(json!(3));
    channel.clear();
    assert!(channel.is_empty());
}
