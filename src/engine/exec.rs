// src/engine/exec.rs

//! Chain walking, retry and readiness execution.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ctx::TaskContext;
use crate::errors::{Result, TaskdagError};
use crate::graph;
use crate::session::Session;
use crate::task::{ExecuteCondition, Task};

use super::supervisor;

/// Cadence of the background state logger.
const STATE_LOG_PERIOD: Duration = Duration::from_millis(100);

type ChainFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Entry point: execute the session's main task DAG.
///
/// Dispatches every root of the main task's upstream closure as a
/// concurrent chain, awaits all chains and all deferred work, then
/// terminates the session and writes a final snapshot. The returned value
/// is `xcom[main].peek()`, or the main task's error if it failed
/// permanently.
pub async fn exec_roots(session: &Session) -> Result<Value> {
    let main = session.main_task().ok_or_else(|| {
        TaskdagError::ConfigError("session has no main task; call set_main_task first".to_string())
    })?;

    graph::validate(&main)?;
    session.register_task(&main);

    session.write_state_log();
    let logger = spawn_state_logger(session);

    let roots = graph::roots(&main);
    info!(
        session = %session.name(),
        main = %main.name(),
        roots = ?roots.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
        "dispatching root chains"
    );

    let cancel = session.cancel_token();
    let mut chains: JoinSet<Result<Value>> = JoinSet::new();
    for root in roots {
        chains.spawn(exec_chain(root, session.clone()));
    }

    let mut first_err: Option<TaskdagError> = None;
    let mut interrupted = false;

    loop {
        if interrupted {
            match chains.join_next().await {
                None => break,
                Some(joined) => record_chain_result(joined, &mut first_err),
            }
        } else {
            tokio::select! {
                joined = chains.join_next() => match joined {
                    None => break,
                    Some(joined) => record_chain_result(joined, &mut first_err),
                },
                _ = cancel.cancelled() => {
                    info!(session = %session.name(), "cancellation requested; aborting chains");
                    interrupted = true;
                    chains.abort_all();
                }
            }
        }
    }

    // Deferred work keeps service-like runs alive until termination is
    // requested; batch runs have nothing deferred and fall through. A
    // failed main task ends the run immediately instead.
    let main_failed = first_err
        .as_ref()
        .and_then(|err| err.task_name())
        .is_some_and(|t| t == main.name());
    if !interrupted && !main_failed {
        tokio::select! {
            _ = session.wait_deferred() => {}
            _ = cancel.cancelled() => {}
        }
    }

    session.terminate();
    session.wait_deferred().await;

    logger.abort();
    session.write_state_log();

    let final_result = session
        .shared_ctx()
        .xcom()
        .peek(main.name())
        .unwrap_or(Value::Null);
    debug!(session = %session.name(), main = %main.name(), "run complete");

    match first_err {
        Some(err) if err.task_name() == Some(main.name()) => Err(err),
        Some(err) => {
            warn!(session = %session.name(), error = %err, "non-main chain failed");
            Ok(final_result)
        }
        None => Ok(final_result),
    }
}

fn record_chain_result(
    joined: std::result::Result<Result<Value>, JoinError>,
    first_err: &mut Option<TaskdagError>,
) {
    match joined {
        Ok(Ok(_value)) => {}
        Ok(Err(err)) => {
            warn!(error = %err, "chain failed");
            if first_err.is_none() {
                *first_err = Some(err);
            }
        }
        Err(err) if err.is_cancelled() => {}
        Err(err) => {
            if first_err.is_none() {
                *first_err = Some(TaskdagError::Other(anyhow::anyhow!(
                    "chain task panicked: {err}"
                )));
            }
        }
    }
}

fn spawn_state_logger(session: &Session) -> JoinHandle<()> {
    let session = session.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_LOG_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if session.is_terminated() {
                break;
            }
            session.write_state_log();
        }
    })
}

/// Execute one task and, on terminal success, its successor chains.
///
/// Short-circuits to `Null` when the session is shutting down or the task
/// is not allowed to run (already claimed, upstream not ready, condition
/// false).
pub fn exec_chain(task: Task, session: Session) -> ChainFuture {
    Box::pin(async move {
        if session.is_terminated() || session.cancel_token().is_cancelled() {
            return Ok(Value::Null);
        }
        if !is_allowed_to_run(&task, &session)? {
            debug!(task = %task.name(), "not allowed to run; short-circuiting chain");
            return Ok(Value::Null);
        }

        let value = exec_task(task.clone(), session.clone()).await?;

        if session.status(task.name()).is_ready() {
            let successors = task.successors();
            if !successors.is_empty() {
                debug!(
                    task = %task.name(),
                    count = successors.len(),
                    "dispatching successor chains"
                );
                let mut set: JoinSet<Result<Value>> = JoinSet::new();
                for successor in successors {
                    set.spawn(exec_chain(successor, session.clone()));
                }

                let mut first_err: Option<TaskdagError> = None;
                while let Some(joined) = set.join_next().await {
                    record_chain_result(joined, &mut first_err);
                }
                if let Some(err) = first_err {
                    return Err(err);
                }
            }
        }

        Ok(value)
    })
}

/// Whether a task may start now:
/// 1. it has not started (or been skipped) in this session, and
/// 2. every upstream is ready, and
/// 3. its execute condition renders true.
///
/// The condition is evaluated again inside [`exec_task`], where upstream
/// outputs are visible; the definitive in-flight guard is the atomic
/// claim taken there.
fn is_allowed_to_run(task: &Task, session: &Session) -> Result<bool> {
    let status = session.status(task.name());
    if status.is_started() || status.is_skipped() {
        return Ok(false);
    }

    for upstream in task.upstreams() {
        if !session.status(upstream.name()).is_ready() {
            debug!(
                task = %task.name(),
                upstream = %upstream.name(),
                "upstream not ready"
            );
            return Ok(false);
        }
    }

    let ctx = TaskContext::new(session.shared_ctx().clone(), task);
    eval_execute_condition(task, &ctx)
}

fn eval_execute_condition(task: &Task, ctx: &TaskContext) -> Result<bool> {
    match task.execute_condition() {
        ExecuteCondition::Bool(value) => Ok(*value),
        ExecuteCondition::Template(template) => {
            let rendered = ctx.render(template)?;
            Ok(truthy(&rendered))
        }
    }
}

fn truthy(s: &str) -> bool {
    !matches!(
        s.trim().to_lowercase().as_str(),
        "" | "false" | "0" | "no" | "none"
    )
}

/// Boxed wrapper so the check-task recursion through `JoinSet::spawn`
/// does not produce an infinitely recursive future type.
pub(crate) fn exec_task(task: Task, session: Session) -> ChainFuture {
    Box::pin(exec_task_inner(task, session))
}

async fn exec_task_inner(task: Task, session: Session) -> Result<Value> {
    let status = session.status(task.name());

    if !status.try_claim() {
        debug!(task = %task.name(), "already claimed in this session");
        return Ok(Value::Null);
    }

    // Condition is re-evaluated here so templates see upstream outputs.
    let ctx = TaskContext::new(session.shared_ctx().clone(), &task);
    if !eval_execute_condition(&task, &ctx)? {
        info!(task = %task.name(), "execute condition is false; skipping");
        status.mark_skipped();
        status.mark_ready();
        return Ok(Value::Null);
    }

    status.mark_started();

    let action = tokio::spawn(execute_action_until_ready(task.clone(), session.clone()));
    session.track_action(task.name(), action.abort_handle());

    if task.monitor() && !task.readiness_checks().is_empty() {
        let sup = tokio::spawn(supervisor::run(task.clone(), session.clone()));
        session.defer(sup);
    }

    match action.await {
        Ok(result) => result,
        Err(err) if err.is_cancelled() => Err(TaskdagError::Cancelled(format!(
            "task '{}' was cancelled",
            task.name()
        ))),
        Err(err) => Err(TaskdagError::Other(anyhow::anyhow!(
            "task '{}' panicked: {err}",
            task.name()
        ))),
    }
}

/// Run the action to terminal success.
///
/// One-shot tasks: the retry loop runs to completion, then the task is
/// ready. Service tasks (non-empty readiness checks): the action keeps
/// running in the background as deferred work; readiness of the checks
/// decides success, and the returned value is whatever is on the task's
/// xcom at that point.
async fn execute_action_until_ready(task: Task, session: Session) -> Result<Value> {
    let checks = task.readiness_checks();

    if checks.is_empty() {
        let value = execute_action_with_retry(task.clone(), session.clone()).await?;
        session.status(task.name()).mark_ready();
        return Ok(value);
    }

    let bg_task = task.clone();
    let bg_session = session.clone();
    let handle = tokio::spawn(async move {
        let name = bg_task.name().to_string();
        if let Err(err) = execute_action_with_retry(bg_task, bg_session).await {
            warn!(task = %name, error = %err, "service action ended with error");
        }
    });
    session.track_action(task.name(), handle.abort_handle());
    session.defer(handle);

    let cancel = session.cancel_token();
    tokio::select! {
        _ = cancel.cancelled() => {
            return Err(TaskdagError::Cancelled(format!(
                "readiness wait for '{}' cancelled",
                task.name()
            )));
        }
        _ = tokio::time::sleep(task.check_delay()) => {}
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(TaskdagError::Cancelled(format!(
            "readiness wait for '{}' cancelled",
            task.name()
        ))),
        gathered = run_readiness_checks(&task, &session) => {
            if let Err(err) = gathered {
                // The service never came up: cancel its action and land
                // the status in a terminal state.
                session.abort_action(task.name());
                let status = session.status(task.name());
                status.mark_failed();
                status.mark_permanently_failed();
                return Err(err);
            }
            let status = session.status(task.name());
            status.mark_completed();
            status.mark_ready();
            info!(task = %task.name(), "readiness checks passed; task is ready");
            Ok(session
                .shared_ctx()
                .xcom()
                .peek(task.name())
                .unwrap_or(Value::Null))
        }
    }
}

/// The retry loop. Attempts 0..=retries; on success pushes the value to
/// xcom (exactly once per successful attempt) and marks completed. On
/// exhaustion marks permanent failure, runs fallback chains, and
/// re-raises the original error.
pub(crate) async fn execute_action_with_retry(task: Task, session: Session) -> Result<Value> {
    let status = session.status(task.name());
    let xcom = session.shared_ctx().xcom().clone();
    let max_attempt = task.retries() + 1;
    let mut attempt: u32 = 0;

    loop {
        let ctx = TaskContext::new(session.shared_ctx().clone(), &task)
            .with_attempt(attempt, max_attempt);

        debug!(task = %task.name(), attempt, max_attempt, "executing action");
        match task.exec(ctx).await {
            Ok(value) => {
                xcom.push(task.name(), value.clone());
                status.mark_completed();
                debug!(task = %task.name(), attempt, "action succeeded");
                return Ok(value);
            }
            Err(err) => {
                status.mark_failed();
                warn!(
                    task = %task.name(),
                    attempt,
                    max_attempt,
                    error = %err,
                    "action attempt failed"
                );

                if attempt + 1 < max_attempt {
                    tokio::time::sleep(task.retry_period()).await;
                    attempt += 1;
                    continue;
                }

                status.mark_permanently_failed();
                run_fallbacks(&task, &session).await;
                return Err(TaskdagError::PermanentFailure {
                    task: task.name().to_string(),
                    attempts: max_attempt,
                    source: err,
                });
            }
        }
    }
}

/// Fallback chains run concurrently; their errors are logged, never
/// surfaced, so callers always see the original task error.
async fn run_fallbacks(task: &Task, session: &Session) {
    let fallbacks = task.fallbacks();
    if fallbacks.is_empty() {
        return;
    }

    info!(
        task = %task.name(),
        count = fallbacks.len(),
        "permanent failure; dispatching fallback chains"
    );

    let mut set: JoinSet<Result<Value>> = JoinSet::new();
    for fallback in fallbacks {
        set.spawn(exec_chain(fallback, session.clone()));
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(_value)) => {}
            Ok(Err(err)) => warn!(task = %task.name(), error = %err, "fallback chain failed"),
            Err(err) if err.is_cancelled() => {}
            Err(err) => warn!(task = %task.name(), error = %err, "fallback chain panicked"),
        }
    }
}

/// Run all readiness checks of `parent` concurrently under the parent's
/// check timeout. Checks are sibling tasks in a nested scope: their own
/// status entries, no upstream gating, sharing the session xcom.
pub(crate) async fn run_readiness_checks(parent: &Task, session: &Session) -> Result<()> {
    let checks = parent.readiness_checks();
    if checks.is_empty() {
        return Ok(());
    }

    let mut set: JoinSet<Result<Value>> = JoinSet::new();
    for check in checks {
        set.spawn(exec_task(check, session.clone()));
    }

    let parent_name = parent.name().to_string();
    let gather = async {
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(_value)) => {}
                Ok(Err(err)) => {
                    return Err(TaskdagError::ReadinessFailed {
                        task: parent_name.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    return Err(TaskdagError::ReadinessFailed {
                        task: parent_name.clone(),
                        reason: format!("check aborted: {err}"),
                    });
                }
            }
        }
        Ok(())
    };

    match tokio::time::timeout(parent.check_timeout(), gather).await {
        Ok(result) => result,
        Err(_elapsed) => Err(TaskdagError::ReadinessFailed {
            task: parent.name().to_string(),
            reason: format!("timed out after {:?}", parent.check_timeout()),
        }),
    }
}
