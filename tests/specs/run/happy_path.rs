//! Scenario: single message, happy path.

use crate::prelude::*;
use ocean_core::{EventScope, RunStatus, ScopeKind};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn one_message_processed_to_idle() {
    let (ocean, _clock) = ocean_in_memory();
    ocean.register_clog(Arc::new(ChatClog));
    let run_id = chat_run(&ocean, Some(json!({ "text": "hi" })));

    let report = ocean.advance().await.unwrap();
    assert_eq!(report.advanced, 1);
    assert_eq!(report.results[0].run_id, run_id);
    assert_eq!(report.results[0].outcome, "ok");

    let run = ocean.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Idle);
    assert_eq!(run.attempt, 0);
    assert_eq!(run.last_error, None);

    // Exactly the one emitted event, with seq 1.
    let events = ocean
        .read_events(&EventScope::Run(run_id.clone()), 0, None)
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].seq, 1);
    assert_eq!(events[0].event_type, "message.processed");
    assert_eq!(events[0].scope_kind, ScopeKind::Run);
    assert_eq!(events[0].payload, json!({ "text": "hi" }));
}

#[tokio::test]
async fn advance_after_idle_finds_nothing() {
    let (ocean, _clock) = ocean_in_memory();
    ocean.register_clog(Arc::new(ChatClog));
    chat_run(&ocean, Some(json!({ "text": "hi" })));

    ocean.advance().await.unwrap();
    let report = ocean.advance().await.unwrap();
    assert_eq!(report.advanced, 0);
}

#[tokio::test]
async fn signal_then_advance_processes_the_new_input() {
    let (ocean, _clock) = ocean_in_memory();
    ocean.register_clog(Arc::new(ChatClog));
    let run_id = chat_run(&ocean, None);

    // Idle run; nothing to do yet.
    assert_eq!(ocean.advance().await.unwrap().advanced, 0);

    ocean.signal(&run_id, Some(json!({ "text": "now" }))).unwrap();
    let report = ocean.advance().await.unwrap();
    assert_eq!(report.advanced, 1);

    let events = ocean
        .read_events(&EventScope::Run(run_id.clone()), 0, None)
        .unwrap();
    assert_eq!(events[0].payload, json!({ "text": "now" }));

    let run = ocean.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Idle);
}
