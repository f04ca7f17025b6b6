// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema definition and migration
//!
//! Seven tables plus the event log. Column names are part of the public
//! contract; cascade wiring carries the deletion topology
//! (session → runs → ticks → tick storage, session → session storage,
//! run → run storage). Events stand outside the cascade and are pruned
//! only by the TTL sweep.

use crate::db::Db;
use crate::error::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ocean_sessions (
    session_id  TEXT PRIMARY KEY,
    created_ts  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    run_id          TEXT PRIMARY KEY,
    session_id      TEXT NOT NULL REFERENCES ocean_sessions(session_id) ON DELETE CASCADE,
    clog_id         TEXT NOT NULL,
    status          TEXT NOT NULL,
    state           TEXT,
    locked_by       TEXT,
    lock_expires_at INTEGER,
    attempt         INTEGER NOT NULL DEFAULT 0,
    max_attempts    INTEGER NOT NULL DEFAULT 3,
    wake_at         INTEGER,
    pending_input   TEXT,
    last_error      TEXT,
    created_ts      INTEGER NOT NULL,
    updated_ts      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ocean_ticks (
    run_id      TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
    tick_id     TEXT NOT NULL,
    created_ts  INTEGER NOT NULL,
    PRIMARY KEY (run_id, tick_id)
);

CREATE TABLE IF NOT EXISTS ocean_storage_global (
    clog_id     TEXT PRIMARY KEY,
    value       TEXT,
    updated_ts  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ocean_storage_session (
    clog_id     TEXT NOT NULL,
    session_id  TEXT NOT NULL REFERENCES ocean_sessions(session_id) ON DELETE CASCADE,
    value       TEXT,
    updated_ts  INTEGER NOT NULL,
    PRIMARY KEY (clog_id, session_id)
);

CREATE TABLE IF NOT EXISTS ocean_storage_run (
    clog_id     TEXT NOT NULL,
    run_id      TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
    value       TEXT,
    updated_ts  INTEGER NOT NULL,
    PRIMARY KEY (clog_id, run_id)
);

CREATE TABLE IF NOT EXISTS ocean_storage_tick (
    clog_id     TEXT NOT NULL,
    run_id      TEXT NOT NULL,
    tick_id     TEXT NOT NULL,
    row_id      TEXT NOT NULL,
    value       TEXT,
    updated_ts  INTEGER NOT NULL,
    PRIMARY KEY (clog_id, run_id, tick_id, row_id),
    FOREIGN KEY (run_id, tick_id) REFERENCES ocean_ticks(run_id, tick_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS events (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT NOT NULL UNIQUE,
    ts          INTEGER NOT NULL,
    scope_kind  TEXT NOT NULL,
    session_id  TEXT,
    run_id      TEXT,
    tick_id     TEXT,
    type        TEXT NOT NULL,
    payload     TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts);
CREATE INDEX IF NOT EXISTS idx_events_run_seq ON events(run_id, seq);
CREATE INDEX IF NOT EXISTS idx_events_session_seq ON events(session_id, seq);
";

/// Apply the schema. Idempotent.
pub fn migrate(db: &Db) -> Result<(), StorageError> {
    db.with(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
