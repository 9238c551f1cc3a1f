// tests/readiness_supervisor.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;

use taskdag::{SharedContext, Session, Task, run_async};
use taskdag_test_utils::fake_actions::{FlagCheckAction, PendingAction};
use taskdag_test_utils::{init_tracing, wait_until};

fn service_task(
    launches: Arc<AtomicUsize>,
    healthy: Arc<AtomicBool>,
) -> Task {
    let check = Task::builder("S_check")
        .action(Box::new(FlagCheckAction::new(healthy)))
        .build();

    Task::builder("S")
        .action(Box::new(PendingAction::new(launches)))
        .readiness_check(&check)
        .monitor(true)
        .check_delay(Duration::from_millis(50))
        .check_period(Duration::from_millis(100))
        .failure_threshold(2)
        .check_timeout(Duration::from_millis(500))
        .build()
}

/// A service task becomes ready when its check passes, the supervisor
/// restarts it exactly once after two failed cycles, it becomes ready
/// again on recovery, and termination cancels its action cleanly.
#[tokio::test(start_paused = true)]
async fn supervisor_restarts_degraded_service_once() {
    init_tracing();

    let launches = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(true));
    let service = service_task(launches.clone(), healthy.clone());

    let session = Session::new(SharedContext::new());
    let run_handle = {
        let task = service.clone();
        let session = session.clone();
        tokio::spawn(async move { run_async(&task, Some(session), HashMap::new()).await })
    };

    // Initial readiness: the action is launched once, checks pass.
    assert!(
        wait_until(|| session.status("S").is_ready(), Duration::from_secs(5)).await,
        "service should come up"
    );
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    // Degrade: two consecutive failed cycles trigger exactly one restart.
    healthy.store(false, Ordering::SeqCst);
    assert!(
        wait_until(|| launches.load(Ordering::SeqCst) == 2, Duration::from_secs(10)).await,
        "supervisor should restart the action"
    );

    // Recover: the supervisor marks the task ready again.
    healthy.store(true, Ordering::SeqCst);
    assert!(
        wait_until(|| session.status("S").is_ready(), Duration::from_secs(10)).await,
        "service should come up again after restart"
    );

    assert_eq!(launches.load(Ordering::SeqCst), 2, "exactly one restart");
    assert!(!session.status("S").is_permanently_failed());

    // Termination cancels the service action and ends the run.
    session.request_termination();
    let result = run_handle.await.expect("run task should not panic");
    let value = result.expect("termination is not an error");
    // The service action never returned, so nothing was pushed.
    assert_eq!(value, Value::Null);
    assert!(session.is_terminated());
}

/// Empty readiness checks with monitor = true: no supervisor starts and
/// the run completes like any one-shot task.
#[tokio::test]
async fn monitor_without_checks_is_a_oneshot() {
    init_tracing();

    let task = Task::builder("plain")
        .monitor(true)
        .action_fn(|_ctx| async { Ok(Value::String("done".to_string())) })
        .build();

    let session = Session::new(SharedContext::new());
    let result = taskdag_test_utils::with_timeout(run_async(
        &task,
        Some(session.clone()),
        HashMap::new(),
    ))
    .await
    .expect("run should finish without a supervisor keeping it alive");

    assert_eq!(result, Value::String("done".to_string()));
    assert!(session.status("plain").is_ready());
}

/// check_period = 0 must not starve the runtime: the service still comes
/// up and termination still works.
#[tokio::test(start_paused = true)]
async fn zero_check_period_still_yields() {
    init_tracing();

    let launches = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(true));

    let check = Task::builder("C")
        .action(Box::new(FlagCheckAction::new(healthy)))
        .build();
    let service = Task::builder("S")
        .action(Box::new(PendingAction::new(launches)))
        .readiness_check(&check)
        .monitor(true)
        .check_delay(Duration::from_millis(1))
        .check_period(Duration::from_millis(0))
        .check_timeout(Duration::from_millis(500))
        .build();

    let session = Session::new(SharedContext::new());
    let run_handle = {
        let task = service.clone();
        let session = session.clone();
        tokio::spawn(async move { run_async(&task, Some(session), HashMap::new()).await })
    };

    assert!(
        wait_until(|| session.status("S").is_ready(), Duration::from_secs(5)).await,
        "service should come up with a zero check period"
    );

    session.request_termination();
    let result = run_handle.await.expect("run task should not panic");
    assert!(result.is_ok());
}

/// A failing initial readiness gather is a task error: the service never
/// becomes ready and the run surfaces the failure.
#[tokio::test(start_paused = true)]
async fn failed_initial_readiness_is_a_task_error() {
    init_tracing();

    let launches = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));

    let check = Task::builder("C")
        .action(Box::new(FlagCheckAction::new(healthy)))
        .build();
    let service = Task::builder("S")
        .action(Box::new(PendingAction::new(launches)))
        .readiness_check(&check)
        .check_delay(Duration::from_millis(10))
        .check_timeout(Duration::from_millis(200))
        .build();

    let session = Session::new(SharedContext::new());
    let result = run_async(&service, Some(session.clone()), HashMap::new()).await;

    assert!(result.is_err(), "unready service must surface an error");
    assert!(!session.status("S").is_ready());
}
