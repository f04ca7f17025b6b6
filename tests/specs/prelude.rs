//! Test helpers for behavioral specifications.
//!
//! Builds fully-wired engines on in-memory or file-backed databases and
//! provides the small adapters the scenarios share.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use async_trait::async_trait;
use ocean_core::{ClogId, FakeClock, RetryPolicy, RunId, SequentialIdGen, SessionId, TickOutcome};
use ocean_engine::{AdvanceContext, Clog, ClogError, Ocean, OceanConfig};
use ocean_storage::{CreateRun, Db};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub fn config(instance_id: &str) -> OceanConfig {
    OceanConfig {
        instance_id: instance_id.to_string(),
        lock_ms: 30_000,
        events_ttl_ms: 24 * 60 * 60 * 1_000,
        gc_min_interval_ms: 60_000,
    }
}

/// Migrated engine on a private in-memory database.
pub fn ocean_in_memory() -> (Ocean, FakeClock) {
    let clock = FakeClock::new(1_000);
    let db = Db::open_in_memory().unwrap();
    let ocean = Ocean::with_parts(
        db,
        config("inst_a"),
        Arc::new(clock.clone()),
        Arc::new(SequentialIdGen::new()),
    );
    ocean.migrate().unwrap();
    (ocean, clock)
}

/// Engine instance over a shared database file. Multiple instances with
/// distinct ids model multiple processes against one database.
pub fn ocean_at(path: &Path, clock: &FakeClock, instance_id: &str) -> Ocean {
    let db = Db::open(path).unwrap();
    let ocean = Ocean::with_parts(
        db,
        config(instance_id),
        Arc::new(clock.clone()),
        Arc::new(SequentialIdGen::new()),
    );
    ocean.migrate().unwrap();
    ocean
}

pub fn chat_run(ocean: &Ocean, input: Option<Value>) -> RunId {
    ocean
        .create_run(&CreateRun {
            session_id: SessionId::new("s1"),
            clog_id: ClogId::new("chat"),
            input,
            initial_state: None,
            retry: RetryPolicy::default(),
        })
        .unwrap()
}

pub fn chat_run_with_retry(ocean: &Ocean, input: Option<Value>, max_attempts: u32) -> RunId {
    ocean
        .create_run(&CreateRun {
            session_id: SessionId::new("s1"),
            clog_id: ClogId::new("chat"),
            input,
            initial_state: None,
            retry: RetryPolicy { max_attempts },
        })
        .unwrap()
}

type Scripted = Result<TickOutcome, String>;

/// Clog whose advance handler replays a scripted list of outcomes and
/// records what it was called with. An exhausted script returns `Ok`.
pub struct ScriptClog {
    id: ClogId,
    script: Mutex<VecDeque<Scripted>>,
    pub inputs: Mutex<Vec<Option<Value>>>,
    pub attempts: Mutex<Vec<u32>>,
}

impl ScriptClog {
    pub fn new(id: &str) -> Self {
        Self {
            id: ClogId::new(id),
            script: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: TickOutcome) {
        self.script.lock().unwrap().push_back(Ok(outcome));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }
}

#[async_trait]
impl Clog for ScriptClog {
    fn id(&self) -> ClogId {
        self.id.clone()
    }

    fn has_on_advance(&self) -> bool {
        true
    }

    async fn on_advance(
        &self,
        input: Option<Value>,
        cx: AdvanceContext<'_>,
    ) -> Result<TickOutcome, ClogError> {
        self.inputs.lock().unwrap().push(input);
        self.attempts.lock().unwrap().push(cx.attempt);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(ClogError::Handler(message)),
            None => Ok(TickOutcome::Ok),
        }
    }
}

/// A realistic chat adapter: reads its run row, emits one event, writes
/// the run row back, returns `Ok`.
pub struct ChatClog;

#[async_trait]
impl Clog for ChatClog {
    fn id(&self) -> ClogId {
        ClogId::new("chat")
    }

    fn has_on_advance(&self) -> bool {
        true
    }

    async fn on_advance(
        &self,
        input: Option<Value>,
        cx: AdvanceContext<'_>,
    ) -> Result<TickOutcome, ClogError> {
        let run_id = cx.tools.run_id().as_str().to_string();
        cx.tools
            .invoke(
                "ocean.storage.read_scoped",
                json!({ "plans": [{ "kind": "run", "runId": run_id }] }),
            )
            .await?;
        cx.tools
            .invoke(
                "ocean.events.emit",
                json!({
                    "scope": "run",
                    "type": "message.processed",
                    "payload": input.clone().unwrap_or(Value::Null),
                }),
            )
            .await?;
        cx.tools
            .invoke(
                "ocean.storage.write_scoped",
                json!({ "ops": [{
                    "kind": "run.set",
                    "runId": run_id,
                    "value": { "last_input": input },
                }] }),
            )
            .await?;
        Ok(TickOutcome::Ok)
    }
}

/// Clog that replays a scripted list of tool calls inside one tick,
/// records every tool result, then returns `Ok`.
pub struct ToolScriptClog {
    id: ClogId,
    calls: Mutex<VecDeque<(String, Value)>>,
    pub results: Mutex<Vec<Value>>,
}

impl ToolScriptClog {
    pub fn new(id: &str) -> Self {
        Self {
            id: ClogId::new(id),
            calls: Mutex::new(VecDeque::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn push_call(&self, name: &str, input: Value) {
        self.calls.lock().unwrap().push_back((name.to_string(), input));
    }
}

#[async_trait]
impl Clog for ToolScriptClog {
    fn id(&self) -> ClogId {
        self.id.clone()
    }

    fn has_on_advance(&self) -> bool {
        true
    }

    async fn on_advance(
        &self,
        _input: Option<Value>,
        cx: AdvanceContext<'_>,
    ) -> Result<TickOutcome, ClogError> {
        loop {
            let next = self.calls.lock().unwrap().pop_front();
            let Some((name, input)) = next else { break };
            let result = cx.tools.invoke(&name, input).await?;
            self.results.lock().unwrap().push(result);
        }
        Ok(TickOutcome::Ok)
    }
}
