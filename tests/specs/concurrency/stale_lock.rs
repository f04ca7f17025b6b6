//! Scenario: stale lock steal after an instance dies mid-tick.

use crate::prelude::*;
use async_trait::async_trait;
use ocean_core::{ClogId, FakeClock, RunStatus, TickOutcome};
use ocean_engine::{AdvanceContext, Clog, ClogError};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;

/// Clog that never finishes its tick; aborting the advance task models
/// an instance crash with the lock still written.
struct NeverClog {
    entered: Arc<Notify>,
}

#[async_trait]
impl Clog for NeverClog {
    fn id(&self) -> ClogId {
        ClogId::new("chat")
    }

    fn has_on_advance(&self) -> bool {
        true
    }

    async fn on_advance(
        &self,
        _input: Option<Value>,
        _cx: AdvanceContext<'_>,
    ) -> Result<TickOutcome, ClogError> {
        self.entered.notify_one();
        std::future::pending::<()>().await;
        Ok(TickOutcome::Ok)
    }
}

#[tokio::test]
async fn expired_lock_is_stolen_and_the_run_re_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ocean.db");
    let clock = FakeClock::new(1_000);
    let a = ocean_at(&path, &clock, "inst_a");
    let b = ocean_at(&path, &clock, "inst_b");

    let entered = Arc::new(Notify::new());
    a.register_clog(Arc::new(NeverClog {
        entered: entered.clone(),
    }));
    let b_clog = Arc::new(ScriptClog::new("chat"));
    b.register_clog(b_clog.clone());

    let run_id = chat_run(&a, Some(json!({ "text": "hi" })));

    let crashed = {
        let a = a.clone();
        tokio::spawn(async move { a.advance().await })
    };
    entered.notified().await;
    // Instance A dies without releasing.
    crashed.abort();
    let _ = crashed.await;

    // The lock is still live: nothing to steal yet.
    assert_eq!(b.advance().await.unwrap().advanced, 0);

    // After the TTL the lock is stale and instance B wins the run.
    clock.advance_ms(30_000);
    let report = b.advance().await.unwrap();
    assert_eq!(report.advanced, 1);
    assert_eq!(report.results[0].run_id, run_id);

    // A consumed the pending input before dying; the replay sees none.
    assert_eq!(b_clog.inputs.lock().unwrap().as_slice(), [None]);

    let run = b.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Idle);
    assert_eq!(run.attempt, 0);
}
