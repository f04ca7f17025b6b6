// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-call error codes
//!
//! Tool failures are returned to adapters as `{ok:false, error:{…}}`
//! values rather than thrown, so handler code can branch on the code.

use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Stable error codes adapters can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorCode {
    /// A write targeted a row not read earlier in the same tick.
    RbwViolation,
    /// `read_scoped` was invoked a second time this tick.
    StorageReadAlreadyCalled,
    /// `write_scoped` was invoked a second time this tick.
    StorageWriteAlreadyCalled,
    /// `write_scoped` was invoked before `read_scoped`.
    StorageWriteBeforeRead,
    /// Scope identifiers disagree with the current tick context.
    InvalidScope,
    /// The tool dispatcher could not match the tool name.
    UnknownTool,
    /// Peer-call address named an endpoint the clog does not expose.
    UnknownEndpoint,
    /// Peer-call address named a clog that is not registered.
    UnknownClog,
    /// The tool input payload did not parse.
    InvalidInput,
    /// A peer endpoint handler returned an error.
    EndpointFailed,
}

impl ToolErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorCode::RbwViolation => "RBW_VIOLATION",
            ToolErrorCode::StorageReadAlreadyCalled => "STORAGE_READ_ALREADY_CALLED",
            ToolErrorCode::StorageWriteAlreadyCalled => "STORAGE_WRITE_ALREADY_CALLED",
            ToolErrorCode::StorageWriteBeforeRead => "STORAGE_WRITE_BEFORE_READ",
            ToolErrorCode::InvalidScope => "INVALID_SCOPE",
            ToolErrorCode::UnknownTool => "UNKNOWN_TOOL",
            ToolErrorCode::UnknownEndpoint => "UNKNOWN_ENDPOINT",
            ToolErrorCode::UnknownClog => "UNKNOWN_CLOG",
            ToolErrorCode::InvalidInput => "INVALID_INPUT",
            ToolErrorCode::EndpointFailed => "ENDPOINT_FAILED",
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tool failure surfaced to the adapter as a value.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The `{ok:false}` JSON shape handlers receive.
    pub fn to_result_value(&self) -> Value {
        json!({
            "ok": false,
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "details": self.details.clone().unwrap_or(Value::Null),
            },
        })
    }
}

#[cfg(test)]
#[path = "tool_error_tests.rs"]
mod tests;
