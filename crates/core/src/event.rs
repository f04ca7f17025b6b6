// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log records

use crate::id::{RunId, SessionId, TickId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Addressing granularity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Global,
    Session,
    Run,
    Tick,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Global => "global",
            ScopeKind::Session => "session",
            ScopeKind::Run => "run",
            ScopeKind::Tick => "tick",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(ScopeKind::Global),
            "session" => Some(ScopeKind::Session),
            "run" => Some(ScopeKind::Run),
            "tick" => Some(ScopeKind::Tick),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scope selector for reading events back.
///
/// Global selects only globally-scoped events; session and run match any
/// event carrying that id, so tick events surface under their run cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    Global,
    Session(SessionId),
    Run(RunId),
}

/// One entry in the append-only log.
///
/// `seq` is the database-maintained monotone counter; `id` is globally
/// unique. Events never cascade: they outlive the entities they mention
/// and are pruned only by the TTL sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub id: String,
    pub ts: u64,
    pub scope_kind: ScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_id: Option<TickId>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
