// tests/retry_recovery.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use taskdag::session::StatusFlag;
use taskdag::{SharedContext, Session, Task, TaskdagError, run_async};
use taskdag_test_utils::fake_actions::CountingAction;
use taskdag_test_utils::init_tracing;

/// retries = 2, action fails twice then succeeds: three invocations, two
/// failed flags in history, final result "ok".
#[tokio::test(start_paused = true)]
async fn transient_failure_recovered_by_retry() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::builder("A")
        .retries(2)
        .retry_period(Duration::from_millis(50))
        .action(Box::new(CountingAction::new(calls.clone(), 2, json!("ok"))))
        .build();

    let session = Session::new(SharedContext::new());
    let result = run_async(&task, Some(session.clone()), HashMap::new())
        .await
        .expect("run should recover via retry");

    assert_eq!(result, json!("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "action runs 3 times");

    let status = session.status("A");
    assert!(status.is_completed());
    assert!(status.is_ready());
    assert!(!status.is_permanently_failed());
    assert_eq!(status.count_flag(StatusFlag::Failed), 2);
}

/// retries = 0 means one attempt only; failure is immediately permanent.
#[tokio::test]
async fn zero_retries_fails_immediately() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::builder("A")
        .action(Box::new(CountingAction::new(calls.clone(), usize::MAX, json!("never"))))
        .build();

    let session = Session::new(SharedContext::new());
    let result = run_async(&task, Some(session.clone()), HashMap::new()).await;

    match result {
        Err(TaskdagError::PermanentFailure { task, attempts, .. }) => {
            assert_eq!(task, "A");
            assert_eq!(attempts, 1);
        }
        other => panic!("expected PermanentFailure, got {other:?}"),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(session.status("A").is_permanently_failed());
    assert!(!session.status("A").is_ready());
}

/// An always-failing action with retries = n is invoked exactly n + 1 times.
#[tokio::test(start_paused = true)]
async fn always_failing_action_runs_retries_plus_one_times() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let task = Task::builder("A")
        .retries(3)
        .retry_period(Duration::from_millis(10))
        .action(Box::new(CountingAction::new(calls.clone(), usize::MAX, json!("never"))))
        .build();

    let session = Session::new(SharedContext::new());
    let result = run_async(&task, Some(session), HashMap::new()).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
