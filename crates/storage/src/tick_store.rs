// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tick entity rows
//!
//! A tick row is the FK target that keeps tick storage from outliving
//! its tick. Creation is insert-or-ignore, so a tick is created at most
//! once per `(run_id, tick_id)`.

use crate::db::Db;
use crate::error::StorageError;
use ocean_core::{Clock, RunId, TickId};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// Tick table operations.
#[derive(Clone)]
pub struct TickStore {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl TickStore {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn create_tick(&self, run_id: &RunId, tick_id: &TickId) -> Result<(), StorageError> {
        let now = self.clock.epoch_ms();
        self.db.with(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO ocean_ticks (run_id, tick_id, created_ts) \
                 VALUES (?1, ?2, ?3)",
                params![run_id.as_str(), tick_id.as_str(), now],
            )?;
            Ok(())
        })
    }

    pub fn tick_exists(&self, run_id: &RunId, tick_id: &TickId) -> Result<bool, StorageError> {
        self.db.with(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM ocean_ticks WHERE run_id = ?1 AND tick_id = ?2",
                    params![run_id.as_str(), tick_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Delete a tick; its storage rows cascade.
    pub fn delete_tick(&self, run_id: &RunId, tick_id: &TickId) -> Result<(), StorageError> {
        self.db.with(|conn| {
            conn.execute(
                "DELETE FROM ocean_ticks WHERE run_id = ?1 AND tick_id = ?2",
                params![run_id.as_str(), tick_id.as_str()],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "tick_store_tests.rs"]
mod tests;
