// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool invoker: the surface adapters use to reach storage, events, and
//! peer clogs
//!
//! Each invoker is bound to one (tick, clog) pair and carries that
//! pair's budget: exactly one `read_scoped` and one `write_scoped`, the
//! write only for rows the read minted into the ledger. Peer calls get
//! a fresh invoker with the same tick, a zeroed budget, and an empty
//! ledger.
//!
//! Tool failures come back as `{ok:false, error:{code,...}}` values so
//! handler code can branch; only infrastructure failures (the database,
//! serialization of stored rows) surface as `Err`.

use crate::clog::{ClogError, EndpointContext};
use crate::error::EngineError;
use crate::ledger::RbwLedger;
use crate::ocean::Shared;
use ocean_core::{ClogId, RunId, ScopeKind, SessionId, TickId, ToolError, ToolErrorCode};
use ocean_storage::{HistoryOrder, WriteOp};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// The tick a tool invoker is bound to.
#[derive(Debug, Clone)]
pub(crate) struct TickContext {
    pub session_id: SessionId,
    pub run_id: RunId,
    pub tick_id: TickId,
}

/// Per-tick, per-clog tool budget.
#[derive(Default)]
struct Budget {
    read_called: bool,
    write_called: bool,
    ledger: RbwLedger,
}

/// One read plan in a `read_scoped` call.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
enum ReadPlan {
    #[serde(rename = "global")]
    Global,
    #[serde(rename = "session")]
    Session {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    #[serde(rename = "run")]
    Run {
        #[serde(rename = "runId")]
        run_id: RunId,
    },
    #[serde(rename = "tickRows")]
    TickRows {
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(rename = "tickId")]
        tick_id: TickId,
        #[serde(rename = "rowIds")]
        row_ids: Vec<String>,
    },
    #[serde(rename = "historyTicksForRun")]
    HistoryTicksForRun {
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(rename = "rowIds", default)]
        row_ids: Option<Vec<String>>,
        #[serde(rename = "limitTicks", default)]
        limit_ticks: Option<u32>,
        #[serde(default)]
        order: HistoryOrder,
    },
}

#[derive(Deserialize)]
struct ReadInput {
    plans: Vec<ReadPlan>,
}

#[derive(Deserialize)]
struct WriteInput {
    ops: Vec<WriteOp>,
}

#[derive(Deserialize)]
struct EmitInput {
    scope: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct CallInput {
    address: String,
    #[serde(default)]
    payload: Value,
}

/// Tool invoker bound to one (tick, clog) pair.
pub struct ToolInvoker {
    shared: Arc<Shared>,
    ctx: TickContext,
    clog_id: ClogId,
    budget: Mutex<Budget>,
}

impl ToolInvoker {
    pub(crate) fn new(shared: Arc<Shared>, ctx: TickContext, clog_id: ClogId) -> Self {
        Self {
            shared,
            ctx,
            clog_id,
            budget: Mutex::new(Budget::default()),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.ctx.session_id
    }

    pub fn run_id(&self) -> &RunId {
        &self.ctx.run_id
    }

    pub fn tick_id(&self) -> &TickId {
        &self.ctx.tick_id
    }

    pub fn clog_id(&self) -> &ClogId {
        &self.clog_id
    }

    /// Dispatch a tool call by name.
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, EngineError> {
        debug!(tool = name, clog_id = %self.clog_id, run_id = %self.ctx.run_id, "tool call");
        match name {
            "ocean.storage.read_scoped" => self.read_scoped(input),
            "ocean.storage.write_scoped" => self.write_scoped(input),
            "ocean.events.emit" => self.emit_event(input),
            "ocean.clog.call" => self.clog_call(input).await,
            other => Ok(ToolError::new(
                ToolErrorCode::UnknownTool,
                format!("unknown tool: {other}"),
            )
            .to_result_value()),
        }
    }

    /// A fresh invoker for a peer clog: same tick context, new budget.
    fn fresh_for_peer(&self, callee: ClogId) -> ToolInvoker {
        ToolInvoker::new(self.shared.clone(), self.ctx.clone(), callee)
    }

    // --- read_scoped ---

    fn read_scoped(&self, input: Value) -> Result<Value, EngineError> {
        let plans = match serde_json::from_value::<ReadInput>(input) {
            Ok(parsed) => parsed.plans,
            Err(err) => {
                return Ok(ToolError::new(
                    ToolErrorCode::InvalidInput,
                    format!("bad read_scoped input: {err}"),
                )
                .to_result_value())
            }
        };

        let mut budget = self.budget.lock();
        if budget.read_called {
            return Ok(ToolError::new(
                ToolErrorCode::StorageReadAlreadyCalled,
                "read_scoped already called this tick",
            )
            .to_result_value());
        }
        for plan in &plans {
            if let Err(err) = self.check_plan_scope(plan) {
                return Ok(err.to_result_value());
            }
        }
        budget.read_called = true;

        let mut snapshot = Vec::with_capacity(plans.len());
        for plan in &plans {
            snapshot.push(self.execute_plan(plan, &mut budget.ledger)?);
        }
        Ok(json!({ "snapshot": snapshot }))
    }

    fn check_plan_scope(&self, plan: &ReadPlan) -> Result<(), ToolError> {
        match plan {
            ReadPlan::Global => Ok(()),
            ReadPlan::Session { session_id } => self.check_session(session_id),
            ReadPlan::Run { run_id } => self.check_run(run_id),
            ReadPlan::TickRows {
                run_id, tick_id, ..
            } => self.check_tick(run_id, tick_id),
            ReadPlan::HistoryTicksForRun { run_id, .. } => self.check_run(run_id),
        }
    }

    fn execute_plan(
        &self,
        plan: &ReadPlan,
        ledger: &mut RbwLedger,
    ) -> Result<Value, EngineError> {
        match plan {
            ReadPlan::Global => {
                let value = self.shared.scoped.global_get(&self.clog_id)?;
                ledger.record_global();
                Ok(json!({ "kind": "global", "value": value.unwrap_or(Value::Null) }))
            }
            ReadPlan::Session { session_id } => {
                let value = self.shared.scoped.session_get(&self.clog_id, session_id)?;
                ledger.record_session(session_id);
                Ok(json!({
                    "kind": "session",
                    "sessionId": session_id.as_str(),
                    "value": value.unwrap_or(Value::Null),
                }))
            }
            ReadPlan::Run { run_id } => {
                let value = self.shared.scoped.run_get(&self.clog_id, run_id)?;
                ledger.record_run(run_id);
                Ok(json!({
                    "kind": "run",
                    "runId": run_id.as_str(),
                    "value": value.unwrap_or(Value::Null),
                }))
            }
            ReadPlan::TickRows {
                run_id,
                tick_id,
                row_ids,
            } => {
                let rows =
                    self.shared
                        .scoped
                        .tick_rows_get(&self.clog_id, run_id, tick_id, row_ids)?;
                // The requested ids mint capabilities whether or not a
                // row is currently persisted.
                for row_id in row_ids {
                    ledger.record_tick_row(run_id, tick_id, row_id);
                }
                Ok(json!({
                    "kind": "tickRows",
                    "runId": run_id.as_str(),
                    "tickId": tick_id.as_str(),
                    "rows": serde_json::to_value(rows)?,
                }))
            }
            ReadPlan::HistoryTicksForRun {
                run_id,
                row_ids,
                limit_ticks,
                order,
            } => {
                let ticks = self.shared.scoped.history(
                    &self.clog_id,
                    run_id,
                    row_ids.as_deref(),
                    *limit_ticks,
                    *order,
                )?;
                // History reads never record; they unlock nothing.
                let ticks: Vec<Value> = ticks
                    .into_iter()
                    .map(|t| {
                        Ok(json!({
                            "tickId": t.tick_id.as_str(),
                            "updatedTs": t.updated_ts,
                            "rows": serde_json::to_value(t.rows)?,
                        }))
                    })
                    .collect::<Result<_, EngineError>>()?;
                Ok(json!({
                    "kind": "historyTicksForRun",
                    "runId": run_id.as_str(),
                    "ticks": ticks,
                }))
            }
        }
    }

    // --- write_scoped ---

    fn write_scoped(&self, input: Value) -> Result<Value, EngineError> {
        let ops = match serde_json::from_value::<WriteInput>(input) {
            Ok(parsed) => parsed.ops,
            Err(err) => {
                return Ok(ToolError::new(
                    ToolErrorCode::InvalidInput,
                    format!("bad write_scoped input: {err}"),
                )
                .to_result_value())
            }
        };

        let mut budget = self.budget.lock();
        if !budget.read_called {
            return Ok(ToolError::new(
                ToolErrorCode::StorageWriteBeforeRead,
                "write_scoped called before read_scoped",
            )
            .to_result_value());
        }
        if budget.write_called {
            return Ok(ToolError::new(
                ToolErrorCode::StorageWriteAlreadyCalled,
                "write_scoped already called this tick",
            )
            .to_result_value());
        }
        // Validate every op before executing any.
        for op in &ops {
            if let Err(err) = self.check_op(op, &budget.ledger) {
                return Ok(err.to_result_value());
            }
        }
        budget.write_called = true;
        drop(budget);

        let applied = self.shared.scoped.apply_ops(&self.clog_id, &ops)?;
        Ok(json!({ "applied": applied }))
    }

    fn check_op(&self, op: &WriteOp, ledger: &RbwLedger) -> Result<(), ToolError> {
        match op {
            WriteOp::GlobalSet { .. } | WriteOp::GlobalClear => {
                if !ledger.allows_global() {
                    return Err(rbw_error("global row was not read this tick"));
                }
            }
            WriteOp::SessionSet { session_id, .. }
            | WriteOp::SessionClear { session_id }
            | WriteOp::SessionDelete { session_id } => {
                self.check_session(session_id)?;
                if !ledger.allows_session(session_id) {
                    return Err(rbw_error("session row was not read this tick"));
                }
            }
            WriteOp::RunSet { run_id, .. }
            | WriteOp::RunClear { run_id }
            | WriteOp::RunDelete { run_id } => {
                self.check_run(run_id)?;
                if !ledger.allows_run(run_id) {
                    return Err(rbw_error("run row was not read this tick"));
                }
            }
            WriteOp::TickSet {
                run_id,
                tick_id,
                row_id,
                ..
            }
            | WriteOp::TickDel {
                run_id,
                tick_id,
                row_id,
            } => {
                self.check_tick(run_id, tick_id)?;
                if !ledger.allows_tick_row(run_id, tick_id, row_id) {
                    return Err(rbw_error(format!(
                        "tick row '{row_id}' was not read this tick"
                    )));
                }
            }
            WriteOp::TickDelete { run_id, tick_id } => {
                self.check_tick(run_id, tick_id)?;
                if !ledger.allows_any_tick_row(run_id, tick_id) {
                    return Err(rbw_error("no row of this tick was read this tick"));
                }
            }
        }
        Ok(())
    }

    // --- events.emit ---

    fn emit_event(&self, input: Value) -> Result<Value, EngineError> {
        let emit = match serde_json::from_value::<EmitInput>(input) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(ToolError::new(
                    ToolErrorCode::InvalidInput,
                    format!("bad emit input: {err}"),
                )
                .to_result_value())
            }
        };
        let Some(kind) = ScopeKind::parse(&emit.scope) else {
            return Ok(ToolError::new(
                ToolErrorCode::InvalidScope,
                format!("unknown event scope: {}", emit.scope),
            )
            .to_result_value());
        };
        let (session_id, run_id, tick_id) = match kind {
            ScopeKind::Global => (None, None, None),
            ScopeKind::Session => (Some(&self.ctx.session_id), None, None),
            ScopeKind::Run => (Some(&self.ctx.session_id), Some(&self.ctx.run_id), None),
            ScopeKind::Tick => (
                Some(&self.ctx.session_id),
                Some(&self.ctx.run_id),
                Some(&self.ctx.tick_id),
            ),
        };
        self.shared.events.append(
            kind,
            session_id,
            run_id,
            tick_id,
            &emit.event_type,
            &emit.payload,
        )?;
        Ok(json!({ "ok": true }))
    }

    // --- clog.call ---

    async fn clog_call(&self, input: Value) -> Result<Value, EngineError> {
        let call = match serde_json::from_value::<CallInput>(input) {
            Ok(parsed) => parsed,
            Err(err) => {
                return Ok(ToolError::new(
                    ToolErrorCode::InvalidInput,
                    format!("bad clog.call input: {err}"),
                )
                .to_result_value())
            }
        };
        let Some((callee_id, method)) = parse_address(&call.address) else {
            return Ok(ToolError::new(
                ToolErrorCode::InvalidInput,
                format!("invalid clog address: {}", call.address),
            )
            .to_result_value());
        };
        let Some(callee) = self.shared.registry.get(&callee_id) else {
            return Ok(ToolError::new(
                ToolErrorCode::UnknownClog,
                format!("clog not registered: {callee_id}"),
            )
            .to_result_value());
        };

        let peer_tools = self.fresh_for_peer(callee_id.clone());
        let result = callee
            .endpoint(&method, call.payload, EndpointContext { tools: &peer_tools })
            .await;
        match result {
            Ok(value) => Ok(json!({ "result": value })),
            Err(ClogError::UnknownEndpoint(m)) => Ok(ToolError::new(
                ToolErrorCode::UnknownEndpoint,
                format!("unknown endpoint: {m}"),
            )
            .with_details(json!({ "clogId": callee_id.as_str() }))
            .to_result_value()),
            Err(ClogError::Engine(err)) => Err(err),
            Err(other) => Ok(ToolError::new(ToolErrorCode::EndpointFailed, other.to_string())
                .to_result_value()),
        }
    }

    // --- scope checks ---

    fn check_session(&self, session_id: &SessionId) -> Result<(), ToolError> {
        if session_id != &self.ctx.session_id {
            return Err(scope_error("sessionId", self.ctx.session_id.as_str(), session_id.as_str()));
        }
        Ok(())
    }

    fn check_run(&self, run_id: &RunId) -> Result<(), ToolError> {
        if run_id != &self.ctx.run_id {
            return Err(scope_error("runId", self.ctx.run_id.as_str(), run_id.as_str()));
        }
        Ok(())
    }

    fn check_tick(&self, run_id: &RunId, tick_id: &TickId) -> Result<(), ToolError> {
        self.check_run(run_id)?;
        if tick_id != &self.ctx.tick_id {
            return Err(scope_error("tickId", self.ctx.tick_id.as_str(), tick_id.as_str()));
        }
        Ok(())
    }
}

fn scope_error(field: &str, expected: &str, got: &str) -> ToolError {
    ToolError::new(
        ToolErrorCode::InvalidScope,
        format!("{field} does not match the current tick context"),
    )
    .with_details(json!({ "field": field, "expected": expected, "got": got }))
}

fn rbw_error(message: impl Into<String>) -> ToolError {
    ToolError::new(ToolErrorCode::RbwViolation, message)
}

/// Parse a `clog.<id>.<method>` address.
fn parse_address(address: &str) -> Option<(ClogId, String)> {
    let mut parts = address.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("clog"), Some(id), Some(method)) if !id.is_empty() && !method.is_empty() => {
            Some((ClogId::new(id), method.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
