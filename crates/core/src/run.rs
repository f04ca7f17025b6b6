// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run state machine types

use crate::id::{ClogId, RunId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Backoff cap in milliseconds.
const BACKOFF_CAP_MS: u64 = 60_000;

/// Retry backoff for the given attempt number: `min(1000 · 2ⁿ, 60_000)` ms.
///
/// Attempt 1 waits 2 s, attempt 2 waits 4 s, and so on up to the cap.
pub fn backoff_ms(attempt: u32) -> u64 {
    let exp = attempt.min(16);
    BACKOFF_CAP_MS.min(1_000u64.saturating_mul(1u64 << exp))
}

/// Lifecycle status of a run.
///
/// `done` and `failed` are terminal: once entered, no code path mutates
/// the status again short of deleting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Pending,
    Active,
    Waiting,
    Done,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Pending => "pending",
            RunStatus::Active => "active",
            RunStatus::Waiting => "waiting",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(RunStatus::Idle),
            "pending" => Some(RunStatus::Pending),
            "active" => Some(RunStatus::Active),
            "waiting" => Some(RunStatus::Waiting),
            "done" => Some(RunStatus::Done),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Retry policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// A full run row as stored.
///
/// Invariant: `locked_by` and `lock_expires_at` are both null or both
/// non-null; `waiting` implies a non-null `wake_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub clog_id: ClogId,
    pub status: RunStatus,
    pub state: Value,
    pub locked_by: Option<String>,
    pub lock_expires_at: Option<u64>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub wake_at: Option<u64>,
    pub pending_input: Option<Value>,
    pub last_error: Option<String>,
    pub created_ts: u64,
    pub updated_ts: u64,
}

impl RunRow {
    /// A lock is held while `lock_expires_at` is in the future.
    pub fn lock_held_at(&self, now_ms: u64) -> bool {
        matches!(self.lock_expires_at, Some(exp) if exp > now_ms)
    }
}

/// The patch a release applies when no signal arrived during the tick.
///
/// When `status` is terminal the patch wins unconditionally; otherwise a
/// non-null `pending_input` on the row overrides it (signal detection).
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePatch {
    pub status: RunStatus,
    pub attempt: u32,
    pub wake_at: Option<u64>,
    pub last_error: Option<String>,
    pub pending_input: Option<Value>,
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
