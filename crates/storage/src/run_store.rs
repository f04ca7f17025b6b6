// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable run CRUD and the atomic primitives the scheduler relies on
//!
//! Locking is a pair of row fields, not a lock table: a run is "active"
//! while `locked_by` is set and `lock_expires_at` is in the future. The
//! acquire and release paths are single conditional UPDATEs so two
//! concurrent instances can never both win, and a signal landing during
//! a tick can never be lost between the release's check and its commit.

use crate::db::Db;
use crate::error::StorageError;
use ocean_core::{Clock, ClogId, ReleasePatch, RetryPolicy, RunId, RunRow, RunStatus, SessionId};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const RUN_COLUMNS: &str = "run_id, session_id, clog_id, status, state, locked_by, \
     lock_expires_at, attempt, max_attempts, wake_at, pending_input, last_error, \
     created_ts, updated_ts";

/// Parameters for creating a run.
#[derive(Debug, Clone)]
pub struct CreateRun {
    pub session_id: SessionId,
    pub clog_id: ClogId,
    /// Initial signal. `Some(Value::Null)` is a signal; `None` is not.
    pub input: Option<Value>,
    pub initial_state: Option<Value>,
    pub retry: RetryPolicy,
}

/// Run table operations.
#[derive(Clone)]
pub struct RunStore {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl RunStore {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Create a run, creating its session if absent.
    ///
    /// With an initial input the run starts `pending`; without, `idle`.
    pub fn create_run(&self, run_id: &RunId, req: &CreateRun) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let status = if req.input.is_some() {
            RunStatus::Pending
        } else {
            RunStatus::Idle
        };
        let pending_input = req.input.as_ref().map(to_json_text).transpose()?;
        let state = req.initial_state.as_ref().map(to_json_text).transpose()?;
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO ocean_sessions (session_id, created_ts) VALUES (?1, ?2)",
                params![req.session_id.as_str(), now],
            )?;
            tx.execute(
                "INSERT INTO runs (run_id, session_id, clog_id, status, state, locked_by, \
                 lock_expires_at, attempt, max_attempts, wake_at, pending_input, last_error, \
                 created_ts, updated_ts) \
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, 0, ?6, NULL, ?7, NULL, ?8, ?8)",
                params![
                    run_id.as_str(),
                    req.session_id.as_str(),
                    req.clog_id.as_str(),
                    status.as_str(),
                    state,
                    req.retry.max_attempts,
                    pending_input,
                    now,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        debug!(run_id = %run_id, clog_id = %req.clog_id, status = %status, "run created");
        Ok(())
    }

    pub fn get_run(&self, run_id: &RunId) -> Result<Option<RunRow>, StorageError> {
        let raw = self.db.with(|conn| {
            conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE run_id = ?1"),
                params![run_id.as_str()],
                read_raw,
            )
            .optional()
            .map_err(StorageError::from)
        })?;
        raw.map(into_run).transpose()
    }

    /// Enqueue input into a run.
    ///
    /// One statement: writes `pending_input` and folds `idle`/`waiting`
    /// to `pending`. Terminal runs absorb the signal silently; neither
    /// status nor input changes.
    pub fn signal(&self, run_id: &RunId, input: &Value) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let input_text = to_json_text(input)?;
        let updated = self.db.with(|conn| {
            conn.execute(
                "UPDATE runs SET \
                     pending_input = ?1, \
                     status = CASE WHEN status IN ('idle', 'waiting') THEN 'pending' ELSE status END, \
                     updated_ts = ?2 \
                 WHERE run_id = ?3 AND status NOT IN ('done', 'failed')",
                params![input_text, now, run_id.as_str()],
            )
            .map_err(StorageError::from)
        })?;
        if updated == 0 && self.get_run(run_id)?.is_none() {
            return Err(StorageError::RunNotFound(run_id.to_string()));
        }
        debug!(run_id = %run_id, delivered = updated > 0, "signal");
        Ok(())
    }

    /// Atomically select and lock one eligible run.
    ///
    /// Eligible: `pending`, or `waiting` with `wake_at ≤ now`; and the
    /// lock is null or expired. Status is deliberately not flipped to
    /// `active`; the non-null lock is the active marker, which keeps
    /// the predicate simple and lets a stale lock be stolen in place.
    ///
    /// The eligibility check and the lock write are one UPDATE; the
    /// outer WHERE re-asserts the subselect's predicate so concurrent
    /// acquirers cannot both win. The RETURNING row is the snapshot the
    /// scheduler works from: acquire touches only the lock fields, so
    /// `pending_input`, `attempt`, and `status` are pre-update values.
    pub fn acquire(
        &self,
        instance_id: &str,
        lock_ms: u64,
    ) -> Result<Option<RunRow>, StorageError> {
        let now = self.clock.epoch_ms();
        let raw = self.db.with(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE runs \
                        SET locked_by = ?1, lock_expires_at = ?2, updated_ts = ?3 \
                      WHERE run_id = ( \
                              SELECT run_id FROM runs \
                               WHERE (status = 'pending' OR (status = 'waiting' AND wake_at <= ?4)) \
                                 AND (locked_by IS NULL OR lock_expires_at <= ?4) \
                               ORDER BY updated_ts, run_id \
                               LIMIT 1 \
                            ) \
                        AND (status = 'pending' OR (status = 'waiting' AND wake_at <= ?4)) \
                        AND (locked_by IS NULL OR lock_expires_at <= ?4) \
                  RETURNING {RUN_COLUMNS}"
                ),
                params![instance_id, now + lock_ms, now, now],
                read_raw,
            )
            .optional()
            .map_err(StorageError::from)
        })?;
        let run = raw.map(into_run).transpose()?;
        if let Some(run) = &run {
            debug!(run_id = %run.run_id, instance_id, status = %run.status, "run acquired");
        }
        Ok(run)
    }

    /// Null out `pending_input` after acquire, so a signal arriving
    /// during the tick is observable as non-null at release time.
    pub fn consume_pending_input(&self, run_id: &RunId) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        self.db.with(|conn| {
            conn.execute(
                "UPDATE runs SET pending_input = NULL, updated_ts = ?1 WHERE run_id = ?2",
                params![now, run_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Release the lock, folding in any signal that arrived during the
    /// tick.
    ///
    /// One UPDATE with the signal check inside: if `pending_input` is
    /// non-null the run goes back to `pending` with `attempt = 0` and
    /// the newer input kept; otherwise the caller's patch applies. A
    /// terminal patch wins unconditionally, since `done` and `failed` absorb
    /// signals. The check and the lock clear commit together, closing
    /// the window between "handler returned" and "release persisted".
    pub fn release(&self, run_id: &RunId, patch: &ReleasePatch) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        let terminal = patch.status.is_terminal();
        let patch_input = patch.pending_input.as_ref().map(to_json_text).transpose()?;
        self.db.with(|conn| {
            conn.execute(
                "UPDATE runs SET \
                     status = CASE WHEN ?1 = 0 AND pending_input IS NOT NULL \
                                   THEN 'pending' ELSE ?2 END, \
                     attempt = CASE WHEN ?1 = 0 AND pending_input IS NOT NULL \
                                    THEN 0 ELSE ?3 END, \
                     wake_at = CASE WHEN ?1 = 0 AND pending_input IS NOT NULL \
                                    THEN NULL ELSE ?4 END, \
                     last_error = CASE WHEN ?1 = 0 AND pending_input IS NOT NULL \
                                       THEN NULL ELSE ?5 END, \
                     pending_input = CASE WHEN ?1 = 0 AND pending_input IS NOT NULL \
                                          THEN pending_input ELSE ?6 END, \
                     locked_by = NULL, \
                     lock_expires_at = NULL, \
                     updated_ts = ?7 \
                 WHERE run_id = ?8 AND status NOT IN ('done', 'failed')",
                params![
                    terminal,
                    patch.status.as_str(),
                    patch.attempt,
                    patch.wake_at,
                    patch.last_error,
                    patch_input,
                    now,
                    run_id.as_str(),
                ],
            )?;
            Ok(())
        })?;
        debug!(run_id = %run_id, status = %patch.status, attempt = patch.attempt, "run released");
        Ok(())
    }

    /// Delete a run; ticks, tick storage, and run storage cascade.
    pub fn delete_run(&self, run_id: &RunId) -> Result<(), StorageError> {
        self.db.with(|conn| {
            conn.execute("DELETE FROM runs WHERE run_id = ?1", params![run_id.as_str()])?;
            Ok(())
        })
    }

    /// Delete a session; runs and session storage cascade.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.db.with(|conn| {
            conn.execute(
                "DELETE FROM ocean_sessions WHERE session_id = ?1",
                params![session_id.as_str()],
            )?;
            Ok(())
        })
    }
}

fn to_json_text(value: &Value) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

/// Column-ordered raw row, JSON fields still text.
struct RawRun {
    run_id: String,
    session_id: String,
    clog_id: String,
    status: String,
    state: Option<String>,
    locked_by: Option<String>,
    lock_expires_at: Option<u64>,
    attempt: u32,
    max_attempts: u32,
    wake_at: Option<u64>,
    pending_input: Option<String>,
    last_error: Option<String>,
    created_ts: u64,
    updated_ts: u64,
}

fn read_raw(row: &Row<'_>) -> Result<RawRun, rusqlite::Error> {
    Ok(RawRun {
        run_id: row.get(0)?,
        session_id: row.get(1)?,
        clog_id: row.get(2)?,
        status: row.get(3)?,
        state: row.get(4)?,
        locked_by: row.get(5)?,
        lock_expires_at: row.get(6)?,
        attempt: row.get(7)?,
        max_attempts: row.get(8)?,
        wake_at: row.get(9)?,
        pending_input: row.get(10)?,
        last_error: row.get(11)?,
        created_ts: row.get(12)?,
        updated_ts: row.get(13)?,
    })
}

fn into_run(raw: RawRun) -> Result<RunRow, StorageError> {
    let status = RunStatus::parse(&raw.status)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown run status: {}", raw.status)))?;
    let state = match raw.state {
        Some(text) => serde_json::from_str(&text)?,
        None => Value::Null,
    };
    let pending_input = raw
        .pending_input
        .map(|text| serde_json::from_str(&text))
        .transpose()?;
    Ok(RunRow {
        run_id: RunId::new(raw.run_id),
        session_id: SessionId::new(raw.session_id),
        clog_id: ClogId::new(raw.clog_id),
        status,
        state,
        locked_by: raw.locked_by,
        lock_expires_at: raw.lock_expires_at,
        attempt: raw.attempt,
        max_attempts: raw.max_attempts,
        wake_at: raw.wake_at,
        pending_input,
        last_error: raw.last_error,
        created_ts: raw.created_ts,
        updated_ts: raw.updated_ts,
    })
}

#[cfg(test)]
#[path = "run_store_tests.rs"]
mod tests;
