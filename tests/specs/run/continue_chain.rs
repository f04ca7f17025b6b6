//! Scenario: continue chain bounded by the drain limit.

use crate::prelude::*;
use ocean_core::{RunStatus, TickOutcome};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn drain_limit_bounds_a_continue_chain() {
    let (ocean, _clock) = ocean_in_memory();
    let clog = Arc::new(ScriptClog::new("chat"));
    clog.push(TickOutcome::Continue { input: Some(json!({ "step": 2 })) });
    clog.push(TickOutcome::Continue { input: Some(json!({ "step": 3 })) });
    clog.push(TickOutcome::Continue { input: Some(json!({ "step": 4 })) });
    clog.push(TickOutcome::Ok);
    ocean.register_clog(clog.clone());
    let run_id = chat_run(&ocean, Some(json!({ "step": 1 })));

    let report = ocean.drain(2).await.unwrap();
    assert_eq!(report.advanced, 2);

    // The run is still pending, with the next continue-input preserved.
    let run = ocean.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(clog.inputs.lock().unwrap().as_slice(), [
        Some(json!({ "step": 1 })),
        Some(json!({ "step": 2 })),
    ]);

    // A later drain picks up exactly where the chain left off.
    let report = ocean.drain(10).await.unwrap();
    assert_eq!(report.advanced, 2);
    let run = ocean.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Idle);
    assert_eq!(clog.inputs.lock().unwrap().as_slice(), [
        Some(json!({ "step": 1 })),
        Some(json!({ "step": 2 })),
        Some(json!({ "step": 3 })),
        Some(json!({ "step": 4 })),
    ]);
}

#[tokio::test]
async fn continue_without_input_re_enqueues_with_null_field() {
    let (ocean, _clock) = ocean_in_memory();
    let clog = Arc::new(ScriptClog::new("chat"));
    clog.push(TickOutcome::Continue { input: None });
    clog.push(TickOutcome::Ok);
    ocean.register_clog(clog.clone());
    let run_id = chat_run(&ocean, Some(json!(1)));

    ocean.advance().await.unwrap();
    let run = ocean.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Pending);

    ocean.advance().await.unwrap();
    assert_eq!(clog.inputs.lock().unwrap().as_slice(), [Some(json!(1)), None]);
}
