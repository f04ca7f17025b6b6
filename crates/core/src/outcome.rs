// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick outcomes returned by advance handlers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What the scheduler should do with a run after a tick.
///
/// A handler that returns an error is treated as `Retry` with the error's
/// message; see the scheduler for the full transition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TickOutcome {
    /// Work finished for now; the run goes back to `idle`.
    Ok,
    /// The run is complete. Terminal.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
    /// Immediately re-enqueue with the given input.
    Continue {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    /// Sleep until `wake_at` (epoch ms), then become eligible again.
    Wait { wake_at: u64 },
    /// Transient failure; back off and try again, up to `max_attempts`.
    Retry { error: String },
    /// Permanent failure. Terminal, bypasses remaining attempts.
    Failed { error: String },
}

impl TickOutcome {
    /// The status string reported in advance results.
    pub fn status_str(&self) -> &'static str {
        match self {
            TickOutcome::Ok => "ok",
            TickOutcome::Done { .. } => "done",
            TickOutcome::Continue { .. } => "continue",
            TickOutcome::Wait { .. } => "wait",
            TickOutcome::Retry { .. } => "retry",
            TickOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_str())
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
