// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for Ocean
//!
//! Everything durable lives in one SQLite database: sessions, runs,
//! ticks, the four storage scopes, and the append-only event log.
//! Correctness of the run state machine rests on a handful of
//! single-statement conditional updates in [`RunStore`].

mod db;
mod error;
mod event_log;
mod run_store;
mod schema;
mod scoped;
mod tick_store;

pub use db::Db;
pub use error::StorageError;
pub use event_log::EventLog;
pub use run_store::{CreateRun, RunStore};
pub use schema::migrate;
pub use scoped::{HistoryOrder, HistoryTick, ScopedStore, WriteOp};
pub use tick_store::TickStore;
