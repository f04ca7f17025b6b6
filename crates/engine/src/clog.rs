// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter (clog) trait and registry
//!
//! Clogs are the only code that runs inside ticks. They implement this
//! trait, get registered once at startup, and receive their tool
//! invoker through the contexts below.

use crate::error::EngineError;
use crate::tools::ToolInvoker;
use async_trait::async_trait;
use ocean_core::{ClogId, TickOutcome};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by clog handlers.
#[derive(Debug, Error)]
pub enum ClogError {
    #[error("no onAdvance handler")]
    NoAdvanceHandler,
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    /// Adapter-defined failure; the scheduler turns this into a retry.
    #[error("{0}")]
    Handler(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Context handed to an advance handler.
pub struct AdvanceContext<'a> {
    pub tools: &'a ToolInvoker,
    pub attempt: u32,
}

/// Context handed to an endpoint handler.
///
/// Peer invocations share the caller's tick but get their own invoker
/// with a fresh budget and an empty ledger.
pub struct EndpointContext<'a> {
    pub tools: &'a ToolInvoker,
}

/// A user-supplied adapter: an id, optional named endpoints, and an
/// optional advance handler.
#[async_trait]
pub trait Clog: Send + Sync {
    fn id(&self) -> ClogId;

    /// Whether this clog owns runs (handles advance ticks).
    fn has_on_advance(&self) -> bool {
        false
    }

    /// Advance the run one tick. `input` is the pending-input snapshot
    /// taken at acquire; `None` means the run was woken without one.
    async fn on_advance(
        &self,
        input: Option<Value>,
        cx: AdvanceContext<'_>,
    ) -> Result<TickOutcome, ClogError> {
        let _ = (input, cx);
        Err(ClogError::NoAdvanceHandler)
    }

    /// Handle a peer or direct endpoint call.
    async fn endpoint(
        &self,
        method: &str,
        payload: Value,
        cx: EndpointContext<'_>,
    ) -> Result<Value, ClogError> {
        let _ = (payload, cx);
        Err(ClogError::UnknownEndpoint(method.to_string()))
    }
}

/// Process-wide clog registry; read-only after startup.
#[derive(Default)]
pub struct ClogRegistry {
    clogs: RwLock<HashMap<ClogId, Arc<dyn Clog>>>,
}

impl ClogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clog under its own id. Last registration wins.
    pub fn register(&self, clog: Arc<dyn Clog>) {
        self.clogs.write().insert(clog.id(), clog);
    }

    pub fn get(&self, clog_id: &ClogId) -> Option<Arc<dyn Clog>> {
        self.clogs.read().get(clog_id).cloned()
    }
}

#[cfg(test)]
#[path = "clog_tests.rs"]
mod tests;
