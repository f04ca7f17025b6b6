// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use ocean_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the engine.
///
/// These are infrastructure failures and propagate as errors; tool-level
/// failures (budget, RBW, scope) are returned to adapters as
/// `{ok:false}` values instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("clog not registered: {0}")]
    ClogNotFound(String),
}
