// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The advance loop: acquire one ready run, dispatch a tick, apply the
//! outcome
//!
//! One logical unit of work per call. External drivers (cron hits,
//! request handlers, the drain helper) call `advance` repeatedly until
//! it returns zero. A handler error is a retry, never a crash of the
//! scheduler; the run's durable state is the only thing that matters
//! for the next attempt.

use crate::clog::AdvanceContext;
use crate::error::EngineError;
use crate::ocean::Shared;
use crate::tools::{TickContext, ToolInvoker};
use ocean_core::{backoff_ms, ReleasePatch, RunId, RunStatus, TickId, TickOutcome};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one advanced run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceResult {
    pub run_id: RunId,
    /// Status string of the applied outcome.
    pub outcome: String,
}

/// Report returned from `advance` and `drain`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AdvanceReport {
    pub advanced: usize,
    pub results: Vec<AdvanceResult>,
}

impl AdvanceReport {
    fn one(run_id: RunId, outcome: &str) -> Self {
        Self {
            advanced: 1,
            results: vec![AdvanceResult {
                run_id,
                outcome: outcome.to_string(),
            }],
        }
    }
}

/// Advance at most one run.
pub(crate) async fn advance_once(shared: &Arc<Shared>) -> Result<AdvanceReport, EngineError> {
    let config = &shared.config;
    let Some(run) = shared.runs.acquire(&config.instance_id, config.lock_ms)? else {
        return Ok(AdvanceReport::default());
    };

    // Snapshot the input and clear the row field, so a signal landing
    // during the handler is observable as non-null at release.
    let input_snapshot = run.pending_input.clone();
    if input_snapshot.is_some() {
        shared.runs.consume_pending_input(&run.run_id)?;
    }

    let handler = shared
        .registry
        .get(&run.clog_id)
        .filter(|clog| clog.has_on_advance());
    let Some(clog) = handler else {
        warn!(run_id = %run.run_id, clog_id = %run.clog_id, "no onAdvance handler; failing run");
        shared.runs.release(
            &run.run_id,
            &ReleasePatch {
                status: RunStatus::Failed,
                attempt: run.attempt,
                wake_at: None,
                last_error: Some("no onAdvance handler".to_string()),
                pending_input: None,
            },
        )?;
        return Ok(AdvanceReport::one(run.run_id, "failed"));
    };

    let tick_id = TickId::new(shared.id_gen.next("tick"));
    shared.ticks.create_tick(&run.run_id, &tick_id)?;

    let tools = ToolInvoker::new(
        shared.clone(),
        TickContext {
            session_id: run.session_id.clone(),
            run_id: run.run_id.clone(),
            tick_id: tick_id.clone(),
        },
        run.clog_id.clone(),
    );

    let outcome = match clog
        .on_advance(
            input_snapshot.clone(),
            AdvanceContext {
                tools: &tools,
                attempt: run.attempt,
            },
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!(run_id = %run.run_id, error = %err, "handler error becomes retry");
            TickOutcome::Retry {
                error: err.to_string(),
            }
        }
    };

    let patch = outcome_patch(
        &outcome,
        run.attempt,
        run.max_attempts,
        input_snapshot,
        shared.clock.epoch_ms(),
    );
    shared.runs.release(&run.run_id, &patch)?;
    debug!(run_id = %run.run_id, tick_id = %tick_id, outcome = outcome.status_str(), "tick applied");
    Ok(AdvanceReport::one(run.run_id, outcome.status_str()))
}

/// Map a tick outcome to the release patch for the signal-absent case.
/// The release itself folds in any signal that arrived meanwhile.
fn outcome_patch(
    outcome: &TickOutcome,
    attempt: u32,
    max_attempts: u32,
    input_snapshot: Option<Value>,
    now_ms: u64,
) -> ReleasePatch {
    match outcome {
        TickOutcome::Ok => ReleasePatch {
            status: RunStatus::Idle,
            attempt: 0,
            wake_at: None,
            last_error: None,
            pending_input: None,
        },
        TickOutcome::Done { .. } => ReleasePatch {
            status: RunStatus::Done,
            attempt: 0,
            wake_at: None,
            last_error: None,
            pending_input: None,
        },
        TickOutcome::Continue { input } => ReleasePatch {
            status: RunStatus::Pending,
            attempt: 0,
            wake_at: None,
            last_error: None,
            pending_input: input.clone(),
        },
        TickOutcome::Wait { wake_at } => ReleasePatch {
            status: RunStatus::Waiting,
            attempt: 0,
            wake_at: Some(*wake_at),
            last_error: None,
            pending_input: None,
        },
        TickOutcome::Retry { error } => {
            let next_attempt = attempt + 1;
            if next_attempt >= max_attempts {
                ReleasePatch {
                    status: RunStatus::Failed,
                    attempt: next_attempt,
                    wake_at: None,
                    last_error: Some(error.clone()),
                    pending_input: None,
                }
            } else {
                // The consumed input is written back so the next
                // attempt sees it again.
                ReleasePatch {
                    status: RunStatus::Waiting,
                    attempt: next_attempt,
                    wake_at: Some(now_ms + backoff_ms(next_attempt)),
                    last_error: Some(error.clone()),
                    pending_input: input_snapshot,
                }
            }
        }
        TickOutcome::Failed { error } => ReleasePatch {
            status: RunStatus::Failed,
            attempt,
            wake_at: None,
            last_error: Some(error.clone()),
            pending_input: None,
        },
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
