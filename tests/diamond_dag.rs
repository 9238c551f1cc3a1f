// tests/diamond_dag.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use taskdag::{SharedContext, Session, run_async};
use taskdag_test_utils::builders::recording_task;
use taskdag_test_utils::init_tracing;

/// A -> B, A -> C, B -> D, C -> D, main = D.
///
/// A runs exactly once even though two chains converge on it; D runs
/// once after both B and C are ready.
#[tokio::test]
async fn diamond_runs_shared_upstream_once() {
    init_tracing();

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let a = recording_task("A", events.clone());
    let b = recording_task("B", events.clone());
    let c = recording_task("C", events.clone());
    let d = recording_task("D", events.clone());

    b.add_upstream(&a);
    c.add_upstream(&a);
    d.add_upstream(&b);
    d.add_upstream(&c);

    let session = Session::new(SharedContext::new());
    let result = run_async(&d, Some(session.clone()), HashMap::new())
        .await
        .expect("run should succeed");

    assert_eq!(result, json!("D"));

    let ev = events.lock().unwrap().clone();
    let count = |needle: &str| ev.iter().filter(|e| e.as_str() == needle).count();

    assert_eq!(count("start:A"), 1, "A must run exactly once: {ev:?}");
    assert_eq!(count("start:B"), 1);
    assert_eq!(count("start:C"), 1);
    assert_eq!(count("start:D"), 1, "D must run exactly once: {ev:?}");

    let pos = |needle: &str| ev.iter().position(|e| e.as_str() == needle).unwrap();
    assert!(pos("end:A") < pos("start:B"));
    assert!(pos("end:A") < pos("start:C"));
    assert!(pos("end:B") < pos("start:D"));
    assert!(pos("end:C") < pos("start:D"));

    // Exactly one value per task on xcom.
    let xcom = session.shared_ctx().xcom().snapshot();
    for name in ["A", "B", "C", "D"] {
        assert_eq!(xcom[name].len(), 1, "{name} should push exactly once");
    }
}
