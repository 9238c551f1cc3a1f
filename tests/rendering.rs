// tests/rendering.rs

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use taskdag::session::StatusFlag;
use taskdag::task::Input;
use taskdag::{SharedContext, Session, Task, run_async};
use taskdag_test_utils::builders::value_task;
use taskdag_test_utils::init_tracing;

/// Input defaults are templates rendered in declaration order, so later
/// inputs can reference earlier ones.
#[tokio::test]
async fn input_defaults_render_in_declaration_order() {
    init_tracing();

    let task = Task::builder("T")
        .input(Input::str("x").with_default("hello"))
        .input(Input::str("y").with_default("{{input.x}}-world"))
        .action_fn(|ctx| async move {
            let rendered = ctx.render("{{input.y}}")?;
            Ok(Value::String(rendered))
        })
        .build();

    let result = run_async(&task, None, HashMap::new())
        .await
        .expect("run should succeed");

    assert_eq!(result, json!("hello-world"));
}

/// Task-level env declarations overlay the process env; values are
/// templates and may reference inputs.
#[tokio::test]
async fn task_env_overlays_process_env() {
    init_tracing();

    let task = Task::builder("T")
        .input(Input::str("who").with_default("world"))
        .env("GREETING", "hello {{input.who}}")
        .action_fn(|ctx| async move {
            let rendered = ctx.render("{{env.GREETING}}")?;
            Ok(Value::String(rendered))
        })
        .build();

    let result = run_async(&task, None, HashMap::new())
        .await
        .expect("run should succeed");

    assert_eq!(result, json!("hello world"));
}

/// File-sourced env bundles: KEY=VALUE lines, `#` comments ignored.
#[tokio::test]
async fn env_file_bundles_are_applied() {
    init_tracing();

    let mut file = tempfile::NamedTempFile::new().expect("create temp env file");
    writeln!(file, "# service endpoint").unwrap();
    writeln!(file, "HOST=localhost").unwrap();
    writeln!(file, "PORT=8080").unwrap();
    file.flush().unwrap();

    let task = Task::builder("T")
        .env_file(file.path())
        .action_fn(|ctx| async move {
            let rendered = ctx.render("{{env.HOST}}:{{env.PORT}}")?;
            Ok(Value::String(rendered))
        })
        .build();

    let result = run_async(&task, None, HashMap::new())
        .await
        .expect("run should succeed");

    assert_eq!(result, json!("localhost:8080"));
}

/// Templates can peek upstream xcom values; an empty channel renders as
/// the empty string.
#[tokio::test]
async fn templates_peek_xcom() {
    init_tracing();

    let a = value_task("A", "a");
    let b = Task::builder("B")
        .action_fn(|ctx| async move {
            let upstream = ctx.render(r#"{{xcom["A"].peek()}}"#)?;
            let missing = ctx.render(r#"{{xcom["nobody"].peek()}}"#)?;
            Ok(json!(format!("{upstream}/{missing}")))
        })
        .build();

    let _ = a.clone() >> b.clone();

    let session = Session::new(SharedContext::new());
    let result = run_async(&b, Some(session), HashMap::new())
        .await
        .expect("run should succeed");

    assert_eq!(result, json!("a/"));
}

/// A declared input with neither a kwarg nor a default fails before any
/// action runs.
#[tokio::test]
async fn missing_required_input_is_a_config_error() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let task = Task::builder("T")
        .input(Input::str("needed"))
        .action_fn(move |_ctx| {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Ok(Value::Null) }
        })
        .build();

    let result = run_async(&task, None, HashMap::new()).await;

    assert!(matches!(
        result,
        Err(taskdag::TaskdagError::MissingInput(name)) if name == "needed"
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A template that fails to render is a task error for that attempt, and
/// is therefore subject to retry.
#[tokio::test(start_paused = true)]
async fn render_failure_is_retried_like_any_action_error() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    let task = Task::builder("T")
        .retries(1)
        .action_fn(move |ctx| {
            calls2.fetch_add(1, Ordering::SeqCst);
            async move {
                let rendered = ctx.render("{{ this is not a template")?;
                Ok(Value::String(rendered))
            }
        })
        .build();

    let session = Session::new(SharedContext::new());
    let result = run_async(&task, Some(session.clone()), HashMap::new()).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2, "one retry after the render error");
    assert_eq!(session.status("T").count_flag(StatusFlag::Failed), 2);
}
