//! Scenario: two instances, one run, exactly one winner.

use crate::prelude::*;
use async_trait::async_trait;
use ocean_core::{ClogId, FakeClock, RunStatus, TickOutcome};
use ocean_engine::{AdvanceContext, Clog, ClogError};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Notify;

/// Clog that signals when its handler starts and then waits for the
/// test to let it finish, holding the run lock in between.
struct GateClog {
    entered: Arc<Notify>,
    proceed: Arc<Notify>,
}

#[async_trait]
impl Clog for GateClog {
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
        self.proceed.notified().await;
        Ok(TickOutcome::Ok)
    }
}

#[tokio::test]
async fn exactly_one_instance_advances_a_pending_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ocean.db");
    let clock = FakeClock::new(1_000);
    let a = ocean_at(&path, &clock, "inst_a");
    let b = ocean_at(&path, &clock, "inst_b");

    let entered = Arc::new(Notify::new());
    let proceed = Arc::new(Notify::new());
    a.register_clog(Arc::new(GateClog {
        entered: entered.clone(),
        proceed: proceed.clone(),
    }));
    b.register_clog(Arc::new(ScriptClog::new("chat")));

    let run_id = chat_run(&a, Some(json!({ "text": "hi" })));

    let winner = {
        let a = a.clone();
        tokio::spawn(async move { a.advance().await.unwrap() })
    };
    // Wait until instance A is inside the tick (lock held).
    entered.notified().await;

    // Instance B finds nothing while the lock is live.
    let loser = b.advance().await.unwrap();
    assert_eq!(loser.advanced, 0);
    assert!(loser.results.is_empty());

    proceed.notify_one();
    let report = winner.await.unwrap();
    assert_eq!(report.advanced, 1);
    assert_eq!(report.results[0].run_id, run_id);

    // Both instances observe the same released state.
    let seen_by_a = a.get_run(&run_id).unwrap().unwrap();
    let seen_by_b = b.get_run(&run_id).unwrap().unwrap();
    assert_eq!(seen_by_a, seen_by_b);
    assert_eq!(seen_by_a.status, RunStatus::Idle);
}

#[tokio::test]
async fn loser_can_win_the_next_round() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ocean.db");
    let clock = FakeClock::new(1_000);
    let a = ocean_at(&path, &clock, "inst_a");
    let b = ocean_at(&path, &clock, "inst_b");
    a.register_clog(Arc::new(ScriptClog::new("chat")));
    let b_clog = Arc::new(ScriptClog::new("chat"));
    b.register_clog(b_clog.clone());

    let run_id = chat_run(&a, Some(json!(1)));
    assert_eq!(a.advance().await.unwrap().advanced, 1);

    // After the release, a new signal is up for grabs by any instance.
    b.signal(&run_id, Some(json!(2))).unwrap();
    assert_eq!(b.advance().await.unwrap().advanced, 1);
    assert_eq!(b_clog.inputs.lock().unwrap().as_slice(), [Some(json!(2))]);
}
