// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Ocean facade: wiring and the public API
//!
//! No long-running process and no in-memory state between invocations:
//! every durable fact lives in the database, and forward progress is
//! whatever `advance` calls external drivers happen to make.

use crate::clog::{Clog, ClogError, ClogRegistry, EndpointContext};
use crate::error::EngineError;
use crate::scheduler::{self, AdvanceReport};
use crate::tools::{TickContext, ToolInvoker};
use ocean_core::{
    Clock, ClogId, EventRecord, EventScope, IdGen, RunId, RunStatus, SessionId, SystemClock,
    TickId, UuidIdGen,
};
use ocean_storage::{CreateRun, Db, EventLog, RunStore, ScopedStore, TickStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct OceanConfig {
    /// Identity of this process for run locks.
    pub instance_id: String,
    /// Lock TTL for a tick in flight. A crashed instance's lock expires
    /// after this long and the next acquirer steals it.
    pub lock_ms: u64,
    /// Event retention for the TTL sweep.
    pub events_ttl_ms: u64,
    /// Minimum interval between opportunistic sweeps per process.
    pub gc_min_interval_ms: u64,
}

impl Default for OceanConfig {
    fn default() -> Self {
        Self {
            instance_id: UuidIdGen.next("inst"),
            lock_ms: 30_000,
            events_ttl_ms: 24 * 60 * 60 * 1_000,
            gc_min_interval_ms: 60_000,
        }
    }
}

/// Shared engine internals, handed to tool invokers and the scheduler.
pub(crate) struct Shared {
    pub(crate) runs: RunStore,
    pub(crate) ticks: TickStore,
    pub(crate) scoped: ScopedStore,
    pub(crate) events: EventLog,
    pub(crate) registry: ClogRegistry,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) id_gen: Arc<dyn IdGen>,
    pub(crate) config: OceanConfig,
    db: Db,
}

/// What `get_run` exposes to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub clog_id: ClogId,
    pub status: RunStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub wake_at: Option<u64>,
    pub last_error: Option<String>,
    pub created_ts: u64,
    pub updated_ts: u64,
}

/// The Ocean engine.
#[derive(Clone)]
pub struct Ocean {
    pub(crate) shared: Arc<Shared>,
}

impl Ocean {
    /// Production wiring: system clock, uuid ids.
    pub fn new(db: Db, config: OceanConfig) -> Self {
        Self::with_parts(db, config, Arc::new(SystemClock), Arc::new(UuidIdGen))
    }

    /// Full wiring, for tests that need a fake clock or deterministic ids.
    pub fn with_parts(
        db: Db,
        config: OceanConfig,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
    ) -> Self {
        let shared = Shared {
            runs: RunStore::new(db.clone(), clock.clone()),
            ticks: TickStore::new(db.clone(), clock.clone()),
            scoped: ScopedStore::new(db.clone(), clock.clone()),
            events: EventLog::new(db.clone(), clock.clone(), id_gen.clone()),
            registry: ClogRegistry::new(),
            clock,
            id_gen,
            config,
            db,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Apply the schema.
    pub fn migrate(&self) -> Result<(), EngineError> {
        ocean_storage::migrate(&self.shared.db)?;
        Ok(())
    }

    /// Register a clog. Call once per clog at startup.
    pub fn register_clog(&self, clog: Arc<dyn Clog>) {
        self.shared.registry.register(clog);
    }

    /// Create a run; the session is created lazily if absent.
    pub fn create_run(&self, req: &CreateRun) -> Result<RunId, EngineError> {
        let run_id = RunId::new(self.shared.id_gen.next("run"));
        self.shared.runs.create_run(&run_id, req)?;
        Ok(run_id)
    }

    /// Enqueue input into a run. A missing payload signals JSON `null`.
    pub fn signal(&self, run_id: &RunId, input: Option<Value>) -> Result<(), EngineError> {
        let input = input.unwrap_or(Value::Null);
        self.shared.runs.signal(run_id, &input)?;
        Ok(())
    }

    /// Advance at most one run.
    pub async fn advance(&self) -> Result<AdvanceReport, EngineError> {
        scheduler::advance_once(&self.shared).await
    }

    /// Advance until nothing is eligible or `max_rounds` is reached.
    pub async fn drain(&self, max_rounds: usize) -> Result<AdvanceReport, EngineError> {
        let mut total = AdvanceReport::default();
        for _ in 0..max_rounds {
            let report = self.advance().await?;
            if report.advanced == 0 {
                break;
            }
            total.advanced += report.advanced;
            total.results.extend(report.results);
        }
        Ok(total)
    }

    pub fn get_run(&self, run_id: &RunId) -> Result<Option<RunSummary>, EngineError> {
        let row = self.shared.runs.get_run(run_id)?;
        Ok(row.map(|run| RunSummary {
            run_id: run.run_id,
            session_id: run.session_id,
            clog_id: run.clog_id,
            status: run.status,
            attempt: run.attempt,
            max_attempts: run.max_attempts,
            wake_at: run.wake_at,
            last_error: run.last_error,
            created_ts: run.created_ts,
            updated_ts: run.updated_ts,
        }))
    }

    /// Read events after a cursor, filtered by scope.
    pub fn read_events(
        &self,
        scope: &EventScope,
        after_seq: u64,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, EngineError> {
        Ok(self.shared.events.read_by_scope(scope, after_seq, limit)?)
    }

    /// Opportunistic TTL sweep; call from any request path.
    pub fn gc_events_if_due(&self) -> Result<Option<usize>, EngineError> {
        Ok(self.shared.events.gc_if_due(
            self.shared.config.events_ttl_ms,
            self.shared.config.gc_min_interval_ms,
        )?)
    }

    /// Direct endpoint invocation, bypassing the state machine.
    ///
    /// No lock is taken or checked; avoiding interleaving with a live
    /// tick is the caller's responsibility. The tick row is created if
    /// absent so tick-scoped writes have their FK target.
    pub async fn call_clog(
        &self,
        run_id: &RunId,
        tick_id: &TickId,
        clog_id: &ClogId,
        method: &str,
        payload: Value,
    ) -> Result<Value, ClogError> {
        let run = self
            .shared
            .runs
            .get_run(run_id)
            .map_err(EngineError::from)?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;
        let clog = self
            .shared
            .registry
            .get(clog_id)
            .ok_or_else(|| EngineError::ClogNotFound(clog_id.to_string()))?;
        self.shared
            .ticks
            .create_tick(run_id, tick_id)
            .map_err(EngineError::from)?;

        let tools = ToolInvoker::new(
            self.shared.clone(),
            TickContext {
                session_id: run.session_id,
                run_id: run_id.clone(),
                tick_id: tick_id.clone(),
            },
            clog_id.clone(),
        );
        clog.endpoint(method, payload, EndpointContext { tools: &tools })
            .await
    }

    /// Delete a run; ticks and scoped storage cascade.
    pub fn delete_run(&self, run_id: &RunId) -> Result<(), EngineError> {
        Ok(self.shared.runs.delete_run(run_id)?)
    }

    /// Delete a session and everything under it.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<(), EngineError> {
        Ok(self.shared.runs.delete_session(session_id)?)
    }
}

#[cfg(test)]
#[path = "ocean_tests.rs"]
mod tests;
