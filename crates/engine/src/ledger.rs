// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-before-write ledger
//!
//! A tick-local record of what an adapter has read: reads mint the
//! capability to write those rows, writes consume it. Membership is
//! never revoked within a tick, and each peer invocation starts with an
//! empty ledger, so capabilities do not cross adapter boundaries.

use ocean_core::{RunId, SessionId, TickId};
use std::collections::HashSet;

/// Per-tick, per-adapter record of scoped reads.
#[derive(Debug, Default)]
pub(crate) struct RbwLedger {
    global: bool,
    sessions: HashSet<SessionId>,
    runs: HashSet<RunId>,
    tick_rows: HashSet<(RunId, TickId, String)>,
}

impl RbwLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_global(&mut self) {
        self.global = true;
    }

    pub fn record_session(&mut self, session_id: &SessionId) {
        self.sessions.insert(session_id.clone());
    }

    pub fn record_run(&mut self, run_id: &RunId) {
        self.runs.insert(run_id.clone());
    }

    pub fn record_tick_row(&mut self, run_id: &RunId, tick_id: &TickId, row_id: &str) {
        self.tick_rows
            .insert((run_id.clone(), tick_id.clone(), row_id.to_string()));
    }

    pub fn allows_global(&self) -> bool {
        self.global
    }

    pub fn allows_session(&self, session_id: &SessionId) -> bool {
        self.sessions.contains(session_id)
    }

    pub fn allows_run(&self, run_id: &RunId) -> bool {
        self.runs.contains(run_id)
    }

    pub fn allows_tick_row(&self, run_id: &RunId, tick_id: &TickId, row_id: &str) -> bool {
        self.tick_rows
            .contains(&(run_id.clone(), tick_id.clone(), row_id.to_string()))
    }

    /// Whether any row of the given tick was read. Sufficient for the
    /// tick entity delete.
    pub fn allows_any_tick_row(&self, run_id: &RunId, tick_id: &TickId) -> bool {
        self.tick_rows
            .iter()
            .any(|(r, t, _)| r == run_id && t == tick_id)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
