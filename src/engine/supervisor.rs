// src/engine/supervisor.rs

//! Readiness monitoring for service-like tasks.
//!
//! Runs as deferred work for tasks with readiness checks and
//! `monitor = true`. Once the task has come up, the loop re-runs the
//! checks every `check_period`; after `failure_threshold` consecutive
//! failed cycles it cancels the action coroutine, resets the task's
//! status and relaunches the retry loop. The relaunched action is
//! registered as deferred work, so session termination still cleans it
//! up. Readiness failures never surface as task errors.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::session::Session;
use crate::task::Task;

use super::exec;

pub(crate) async fn run(task: Task, session: Session) {
    let name = task.name().to_string();
    let cancel = session.cancel_token();
    let status = session.status(&name);

    debug!(task = %name, "supervisor started");

    // Wait for the task to come up the first time.
    loop {
        if status.is_ready() {
            break;
        }
        if status.is_permanently_failed() {
            debug!(task = %name, "task failed before readiness; supervisor exiting");
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(task = %name, "supervisor cancelled before readiness");
                return;
            }
            _ = tokio::time::sleep(poll_interval(task.check_period())) => {}
        }
    }

    let mut failures: u32 = 0;

    loop {
        // A zero check period must still yield to the runtime.
        tokio::task::yield_now().await;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval(task.check_period())) => {}
        }

        // Reset the checks (not the parent) before re-running them.
        for check in task.readiness_checks() {
            session.status(check.name()).reset();
            session.shared_ctx().xcom().clear(check.name());
        }

        match exec::run_readiness_checks(&task, &session).await {
            Ok(()) => {
                if failures > 0 {
                    debug!(task = %name, "readiness recovered");
                }
                failures = 0;

                // After a restart the status reset cleared completed/ready.
                if !status.is_ready() {
                    status.mark_completed();
                    status.mark_ready();
                    info!(task = %name, "task is ready again after restart");
                }
            }
            Err(err) => {
                failures += 1;
                warn!(
                    task = %name,
                    failures,
                    threshold = task.failure_threshold(),
                    error = %err,
                    "readiness check cycle failed"
                );

                if failures >= task.failure_threshold() {
                    restart(&task, &session).await;
                    failures = 0;
                }
            }
        }
    }

    debug!(task = %name, "supervisor stopped");
}

/// Cancel the action coroutine, reset the parent's status and relaunch
/// the retry loop as deferred work.
async fn restart(task: &Task, session: &Session) {
    let name = task.name();
    info!(task = %name, "failure threshold reached; restarting task action");

    session.abort_action(name);

    let status = session.status(name);
    status.reset();
    status.mark_started();

    let bg_task = task.clone();
    let bg_session = session.clone();
    let handle = tokio::spawn(async move {
        let name = bg_task.name().to_string();
        if let Err(err) = exec::execute_action_with_retry(bg_task, bg_session).await {
            warn!(task = %name, error = %err, "restarted action ended with error");
        }
    });
    session.track_action(name, handle.abort_handle());
    session.defer(handle);
}

fn poll_interval(period: Duration) -> Duration {
    period.max(Duration::from_millis(1))
}
