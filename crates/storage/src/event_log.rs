// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log with scope-filtered replay
//!
//! `seq` is the database-maintained monotone counter and doubles as the
//! read cursor. Events carry the ids of the scope they were emitted at,
//! so a run cursor also surfaces tick events and a session cursor also
//! surfaces run and tick events for that session. Rows are pruned only
//! by the TTL sweep.

use crate::db::Db;
use crate::error::StorageError;
use ocean_core::{
    Clock, EventRecord, EventScope, IdGen, RunId, ScopeKind, SessionId, TickId,
};
use parking_lot::Mutex;
use rusqlite::{params, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_READ_LIMIT: usize = 100;

const EVENT_COLUMNS: &str = "seq, id, ts, scope_kind, session_id, run_id, tick_id, type, payload";

/// Append-only event log operations.
#[derive(Clone)]
pub struct EventLog {
    db: Db,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    last_gc_ms: Arc<Mutex<Option<u64>>>,
}

impl EventLog {
    pub fn new(db: Db, clock: Arc<dyn Clock>, id_gen: Arc<dyn IdGen>) -> Self {
        Self {
            db,
            clock,
            id_gen,
            last_gc_ms: Arc::new(Mutex::new(None)),
        }
    }

    /// Append one event; returns the assigned sequence number.
    pub fn append(
        &self,
        scope_kind: ScopeKind,
        session_id: Option<&SessionId>,
        run_id: Option<&RunId>,
        tick_id: Option<&TickId>,
        event_type: &str,
        payload: &Value,
    ) -> Result<u64, StorageError> {
        let now = self.clock.epoch_ms();
        let id = self.id_gen.next("evt");
        let payload_text = serde_json::to_string(payload)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO events (id, ts, scope_kind, session_id, run_id, tick_id, type, payload) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    now,
                    scope_kind.as_str(),
                    session_id.map(|s| s.as_str()),
                    run_id.map(|r| r.as_str()),
                    tick_id.map(|t| t.as_str()),
                    event_type,
                    payload_text,
                ],
            )?;
            Ok(conn.last_insert_rowid() as u64)
        })
    }

    /// Read events after a cursor, filtered by scope, ordered by `seq`.
    ///
    /// Global matches only `scope_kind = 'global'`; session and run
    /// filter by the id column alone. The cursor for the next read is
    /// the last returned `seq`.
    pub fn read_by_scope(
        &self,
        scope: &EventScope,
        after_seq: u64,
        limit: Option<usize>,
    ) -> Result<Vec<EventRecord>, StorageError> {
        let limit = limit.unwrap_or(DEFAULT_READ_LIMIT) as i64;
        self.db.with(|conn| match scope {
            EventScope::Global => collect_events(
                conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events \
                     WHERE scope_kind = 'global' AND seq > ?1 \
                     ORDER BY seq LIMIT ?2"
                ),
                params![after_seq, limit],
            ),
            EventScope::Session(session_id) => collect_events(
                conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events \
                     WHERE session_id = ?1 AND seq > ?2 \
                     ORDER BY seq LIMIT ?3"
                ),
                params![session_id.as_str(), after_seq, limit],
            ),
            EventScope::Run(run_id) => collect_events(
                conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events \
                     WHERE run_id = ?1 AND seq > ?2 \
                     ORDER BY seq LIMIT ?3"
                ),
                params![run_id.as_str(), after_seq, limit],
            ),
        })
    }

    /// Delete events older than the TTL. Returns the number removed.
    pub fn gc_by_ttl(&self, ttl_ms: u64) -> Result<usize, StorageError> {
        let now = self.clock.epoch_ms();
        let cutoff = now.saturating_sub(ttl_ms);
        let removed = self.db.with(|conn| {
            conn.execute("DELETE FROM events WHERE ts < ?1", params![cutoff])
                .map_err(StorageError::from)
        })?;
        if removed > 0 {
            debug!(removed, cutoff, "event TTL sweep");
        }
        Ok(removed)
    }

    /// Run the TTL sweep if at least `min_interval_ms` elapsed since the
    /// last sweep by this process. Returns the number removed, or `None`
    /// when skipped.
    pub fn gc_if_due(
        &self,
        ttl_ms: u64,
        min_interval_ms: u64,
    ) -> Result<Option<usize>, StorageError> {
        let now = self.clock.epoch_ms();
        {
            let mut last = self.last_gc_ms.lock();
            match *last {
                Some(prev) if now.saturating_sub(prev) < min_interval_ms => return Ok(None),
                _ => *last = Some(now),
            }
        }
        self.gc_by_ttl(ttl_ms).map(Some)
    }
}

fn collect_events<P: rusqlite::Params>(
    conn: &rusqlite::Connection,
    sql: &str,
    params: P,
) -> Result<Vec<EventRecord>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, read_event)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(into_event(row?)?);
    }
    Ok(out)
}

struct RawEvent {
    seq: u64,
    id: String,
    ts: u64,
    scope_kind: String,
    session_id: Option<String>,
    run_id: Option<String>,
    tick_id: Option<String>,
    event_type: String,
    payload: Option<String>,
}

fn read_event(row: &Row<'_>) -> Result<RawEvent, rusqlite::Error> {
    Ok(RawEvent {
        seq: row.get(0)?,
        id: row.get(1)?,
        ts: row.get(2)?,
        scope_kind: row.get(3)?,
        session_id: row.get(4)?,
        run_id: row.get(5)?,
        tick_id: row.get(6)?,
        event_type: row.get(7)?,
        payload: row.get(8)?,
    })
}

fn into_event(raw: RawEvent) -> Result<EventRecord, StorageError> {
    let scope_kind = ScopeKind::parse(&raw.scope_kind)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown scope kind: {}", raw.scope_kind)))?;
    let payload = match raw.payload {
        Some(text) => serde_json::from_str(&text)?,
        None => Value::Null,
    };
    Ok(EventRecord {
        seq: raw.seq,
        id: raw.id,
        ts: raw.ts,
        scope_kind,
        session_id: raw.session_id.map(SessionId::new),
        run_id: raw.run_id.map(RunId::new),
        tick_id: raw.tick_id.map(TickId::new),
        event_type: raw.event_type,
        payload,
    })
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
