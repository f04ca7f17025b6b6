// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite connection handle
//!
//! One `Connection` behind a mutex; handles are cheap clones sharing it.
//! The guard is never held across an await point, so async callers stay
//! `Send`. Cross-process coordination relies on WAL mode plus the busy
//! timeout, and multiple instances may open the same database file.

use crate::error::StorageError;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Shared handle to the Ocean database.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::configure(&conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database (tests, ephemeral use).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Per-connection setup. Foreign keys are off by default in SQLite and
    /// the cascade topology depends on them.
    fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
        Ok(())
    }

    /// Run a closure against the connection under the lock.
    pub(crate) fn with<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.inner.lock();
        f(&mut conn)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
