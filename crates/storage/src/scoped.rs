// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped storage: four durable JSON scopes per adapter
//!
//! One row per clog (global), one per (clog, session), one per
//! (clog, run), and many keyed rows per (clog, run, tick). Values are
//! opaque JSON text. Write batches apply inside a single transaction so
//! a partial failure cannot corrupt state; validation against the RBW
//! ledger happens in the engine before the batch reaches this layer.

use crate::db::Db;
use crate::error::StorageError;
use ocean_core::{Clock, ClogId, RunId, SessionId, TickId};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single operation in a `write_scoped` batch.
///
/// The `kind` strings and field names are the tool wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WriteOp {
    #[serde(rename = "global.set")]
    GlobalSet { value: Value },
    #[serde(rename = "global.clear")]
    GlobalClear,
    #[serde(rename = "session.set")]
    SessionSet {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        value: Value,
    },
    #[serde(rename = "session.clear")]
    SessionClear {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    #[serde(rename = "run.set")]
    RunSet {
        #[serde(rename = "runId")]
        run_id: RunId,
        value: Value,
    },
    #[serde(rename = "run.clear")]
    RunClear {
        #[serde(rename = "runId")]
        run_id: RunId,
    },
    #[serde(rename = "tick.set")]
    TickSet {
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(rename = "tickId")]
        tick_id: TickId,
        #[serde(rename = "rowId")]
        row_id: String,
        value: Value,
    },
    #[serde(rename = "tick.del")]
    TickDel {
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(rename = "tickId")]
        tick_id: TickId,
        #[serde(rename = "rowId")]
        row_id: String,
    },
    #[serde(rename = "session.delete")]
    SessionDelete {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    #[serde(rename = "run.delete")]
    RunDelete {
        #[serde(rename = "runId")]
        run_id: RunId,
    },
    #[serde(rename = "tick.delete")]
    TickDelete {
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(rename = "tickId")]
        tick_id: TickId,
    },
}

/// History read ordering over a run's ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOrder {
    Asc,
    #[default]
    Desc,
}

/// One tick's rows in a history read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTick {
    pub tick_id: TickId,
    pub updated_ts: u64,
    pub rows: BTreeMap<String, Value>,
}

/// Scoped storage operations.
#[derive(Clone)]
pub struct ScopedStore {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl ScopedStore {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn global_get(&self, clog_id: &ClogId) -> Result<Option<Value>, StorageError> {
        self.db.with(|conn| {
            let text: Option<String> = conn
                .query_row(
                    "SELECT value FROM ocean_storage_global WHERE clog_id = ?1",
                    params![clog_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            parse_opt(text)
        })
    }

    pub fn session_get(
        &self,
        clog_id: &ClogId,
        session_id: &SessionId,
    ) -> Result<Option<Value>, StorageError> {
        self.db.with(|conn| {
            let text: Option<String> = conn
                .query_row(
                    "SELECT value FROM ocean_storage_session \
                     WHERE clog_id = ?1 AND session_id = ?2",
                    params![clog_id.as_str(), session_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            parse_opt(text)
        })
    }

    pub fn run_get(
        &self,
        clog_id: &ClogId,
        run_id: &RunId,
    ) -> Result<Option<Value>, StorageError> {
        self.db.with(|conn| {
            let text: Option<String> = conn
                .query_row(
                    "SELECT value FROM ocean_storage_run WHERE clog_id = ?1 AND run_id = ?2",
                    params![clog_id.as_str(), run_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            parse_opt(text)
        })
    }

    /// Fetch tick rows by id. Missing ids are simply absent from the map.
    pub fn tick_rows_get(
        &self,
        clog_id: &ClogId,
        run_id: &RunId,
        tick_id: &TickId,
        row_ids: &[String],
    ) -> Result<BTreeMap<String, Value>, StorageError> {
        let all = self.all_tick_rows(clog_id, run_id, tick_id)?;
        Ok(all
            .into_iter()
            .filter(|(row_id, _)| row_ids.iter().any(|want| want == row_id))
            .collect())
    }

    fn all_tick_rows(
        &self,
        clog_id: &ClogId,
        run_id: &RunId,
        tick_id: &TickId,
    ) -> Result<BTreeMap<String, Value>, StorageError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT row_id, value FROM ocean_storage_tick \
                 WHERE clog_id = ?1 AND run_id = ?2 AND tick_id = ?3",
            )?;
            let rows = stmt.query_map(
                params![clog_id.as_str(), run_id.as_str(), tick_id.as_str()],
                |row| {
                    let row_id: String = row.get(0)?;
                    let text: Option<String> = row.get(1)?;
                    Ok((row_id, text))
                },
            )?;
            let mut out = BTreeMap::new();
            for row in rows {
                let (row_id, text) = row?;
                if let Some(value) = parse_opt(text)? {
                    out.insert(row_id, value);
                }
            }
            Ok(out)
        })
    }

    /// Read a run's tick history: up to `limit_ticks` distinct ticks
    /// ordered by their latest row update, with the requested rows (all
    /// rows when `row_ids` is `None`) and the tick's latest `updated_ts`.
    pub fn history(
        &self,
        clog_id: &ClogId,
        run_id: &RunId,
        row_ids: Option<&[String]>,
        limit_ticks: Option<u32>,
        order: HistoryOrder,
    ) -> Result<Vec<HistoryTick>, StorageError> {
        let limit: i64 = limit_ticks.map(i64::from).unwrap_or(-1);
        let sql = match order {
            HistoryOrder::Asc => {
                "SELECT tick_id, MAX(updated_ts) AS ts FROM ocean_storage_tick \
                 WHERE clog_id = ?1 AND run_id = ?2 \
                 GROUP BY tick_id ORDER BY ts ASC, tick_id ASC LIMIT ?3"
            }
            HistoryOrder::Desc => {
                "SELECT tick_id, MAX(updated_ts) AS ts FROM ocean_storage_tick \
                 WHERE clog_id = ?1 AND run_id = ?2 \
                 GROUP BY tick_id ORDER BY ts DESC, tick_id DESC LIMIT ?3"
            }
        };
        let ticks: Vec<(String, u64)> = self.db.with(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(
                params![clog_id.as_str(), run_id.as_str(), limit],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from)
        })?;

        let mut out = Vec::with_capacity(ticks.len());
        for (tick_id, updated_ts) in ticks {
            let tick_id = TickId::new(tick_id);
            let mut rows = self.all_tick_rows(clog_id, run_id, &tick_id)?;
            if let Some(wanted) = row_ids {
                rows.retain(|row_id, _| wanted.iter().any(|want| want == row_id));
            }
            out.push(HistoryTick {
                tick_id,
                updated_ts,
                rows,
            });
        }
        Ok(out)
    }

    /// Apply a validated op batch inside one transaction.
    ///
    /// Returns the number of ops applied. Any failure rolls back the
    /// whole batch.
    pub fn apply_ops(&self, clog_id: &ClogId, ops: &[WriteOp]) -> Result<usize, StorageError> {
        let now = self.clock.epoch_ms();
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            for op in ops {
                apply_op(&tx, clog_id, op, now)?;
            }
            tx.commit()?;
            Ok(ops.len())
        })
    }
}

fn apply_op(
    conn: &Connection,
    clog_id: &ClogId,
    op: &WriteOp,
    now: u64,
) -> Result<(), StorageError> {
    match op {
        WriteOp::GlobalSet { value } => {
            conn.execute(
                "INSERT INTO ocean_storage_global (clog_id, value, updated_ts) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(clog_id) DO UPDATE SET value = excluded.value, \
                 updated_ts = excluded.updated_ts",
                params![clog_id.as_str(), serde_json::to_string(value)?, now],
            )?;
        }
        WriteOp::GlobalClear => {
            conn.execute(
                "DELETE FROM ocean_storage_global WHERE clog_id = ?1",
                params![clog_id.as_str()],
            )?;
        }
        WriteOp::SessionSet { session_id, value } => {
            conn.execute(
                "INSERT INTO ocean_storage_session (clog_id, session_id, value, updated_ts) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(clog_id, session_id) DO UPDATE SET value = excluded.value, \
                 updated_ts = excluded.updated_ts",
                params![
                    clog_id.as_str(),
                    session_id.as_str(),
                    serde_json::to_string(value)?,
                    now
                ],
            )?;
        }
        WriteOp::SessionClear { session_id } => {
            conn.execute(
                "DELETE FROM ocean_storage_session WHERE clog_id = ?1 AND session_id = ?2",
                params![clog_id.as_str(), session_id.as_str()],
            )?;
        }
        WriteOp::RunSet { run_id, value } => {
            conn.execute(
                "INSERT INTO ocean_storage_run (clog_id, run_id, value, updated_ts) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(clog_id, run_id) DO UPDATE SET value = excluded.value, \
                 updated_ts = excluded.updated_ts",
                params![
                    clog_id.as_str(),
                    run_id.as_str(),
                    serde_json::to_string(value)?,
                    now
                ],
            )?;
        }
        WriteOp::RunClear { run_id } => {
            conn.execute(
                "DELETE FROM ocean_storage_run WHERE clog_id = ?1 AND run_id = ?2",
                params![clog_id.as_str(), run_id.as_str()],
            )?;
        }
        WriteOp::TickSet {
            run_id,
            tick_id,
            row_id,
            value,
        } => {
            conn.execute(
                "INSERT INTO ocean_storage_tick (clog_id, run_id, tick_id, row_id, value, updated_ts) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(clog_id, run_id, tick_id, row_id) DO UPDATE SET \
                 value = excluded.value, updated_ts = excluded.updated_ts",
                params![
                    clog_id.as_str(),
                    run_id.as_str(),
                    tick_id.as_str(),
                    row_id,
                    serde_json::to_string(value)?,
                    now
                ],
            )?;
        }
        WriteOp::TickDel {
            run_id,
            tick_id,
            row_id,
        } => {
            conn.execute(
                "DELETE FROM ocean_storage_tick \
                 WHERE clog_id = ?1 AND run_id = ?2 AND tick_id = ?3 AND row_id = ?4",
                params![clog_id.as_str(), run_id.as_str(), tick_id.as_str(), row_id],
            )?;
        }
        WriteOp::SessionDelete { session_id } => {
            conn.execute(
                "DELETE FROM ocean_sessions WHERE session_id = ?1",
                params![session_id.as_str()],
            )?;
        }
        WriteOp::RunDelete { run_id } => {
            conn.execute("DELETE FROM runs WHERE run_id = ?1", params![run_id.as_str()])?;
        }
        WriteOp::TickDelete { run_id, tick_id } => {
            conn.execute(
                "DELETE FROM ocean_ticks WHERE run_id = ?1 AND tick_id = ?2",
                params![run_id.as_str(), tick_id.as_str()],
            )?;
        }
    }
    Ok(())
}

fn parse_opt(text: Option<String>) -> Result<Option<Value>, StorageError> {
    text.map(|t| serde_json::from_str(&t)).transpose().map_err(StorageError::from)
}

#[cfg(test)]
#[path = "scoped_tests.rs"]
mod tests;
