// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests

use crate::clog::{AdvanceContext, Clog, ClogError, EndpointContext};
use crate::ocean::{Ocean, OceanConfig};
use async_trait::async_trait;
use ocean_core::{ClogId, FakeClock, SequentialIdGen, TickOutcome};
use ocean_storage::Db;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) fn test_config() -> OceanConfig {
    OceanConfig {
        instance_id: "inst_test".to_string(),
        lock_ms: 30_000,
        events_ttl_ms: 24 * 60 * 60 * 1_000,
        gc_min_interval_ms: 60_000,
    }
}

/// In-memory Ocean with a fake clock and sequential ids, migrated.
pub(crate) fn test_ocean() -> (Ocean, FakeClock) {
    let db = Db::open_in_memory().unwrap();
    let clock = FakeClock::new(1_000);
    let ocean = Ocean::with_parts(
        db,
        test_config(),
        Arc::new(clock.clone()),
        Arc::new(SequentialIdGen::new()),
    );
    ocean.migrate().unwrap();
    (ocean, clock)
}

type Scripted = Result<TickOutcome, String>;
type AdvanceHook = Box<dyn Fn() + Send + Sync>;

/// Clog whose advance handler replays a scripted list of outcomes.
///
/// Records the inputs and attempt numbers it was called with; an
/// optional hook runs inside each tick (e.g. to signal the run while
/// the handler is "executing"). An exhausted script returns `Ok`.
pub(crate) struct ScriptClog {
    id: ClogId,
    script: Mutex<VecDeque<Scripted>>,
    hook: Mutex<Option<AdvanceHook>>,
    pub inputs: Mutex<Vec<Option<Value>>>,
    pub attempts: Mutex<Vec<u32>>,
}

impl ScriptClog {
    pub fn new(id: &str) -> Self {
        Self {
            id: ClogId::new(id),
            script: Mutex::new(VecDeque::new()),
            hook: Mutex::new(None),
            inputs: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, outcome: TickOutcome) {
        self.script.lock().push_back(Ok(outcome));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().push_back(Err(message.to_string()));
    }

    pub fn set_hook(&self, hook: AdvanceHook) {
        *self.hook.lock() = Some(hook);
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
        self.inputs.lock().push(input);
        self.attempts.lock().push(cx.attempt);
        if let Some(hook) = self.hook.lock().as_ref() {
            hook();
        }
        match self.script.lock().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(ClogError::Handler(message)),
            None => Ok(TickOutcome::Ok),
        }
    }
}

/// Clog exposing a single `echo` endpoint.
pub(crate) struct EchoClog {
    id: ClogId,
}

impl EchoClog {
    pub fn new(id: &str) -> Self {
        Self { id: ClogId::new(id) }
    }
}

#[async_trait]
impl Clog for EchoClog {
    fn id(&self) -> ClogId {
        self.id.clone()
    }

    async fn endpoint(
        &self,
        method: &str,
        payload: Value,
        _cx: EndpointContext<'_>,
    ) -> Result<Value, ClogError> {
        match method {
            "echo" => Ok(json!({ "echo": payload })),
            other => Err(ClogError::UnknownEndpoint(other.to_string())),
        }
    }
}
