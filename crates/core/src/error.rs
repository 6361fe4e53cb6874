// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy surfaced on the wire.
//!
//! Every subsystem error is translated into one of these kinds before it
//! reaches a client. The kind string is stable; the message is a short human
//! summary (stack detail stays in local logs).

use thiserror::Error;

/// Request-level error as seen by clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl RuntimeError {
    /// Stable kind discriminator for logs and clients.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::NotFound(_) => "not_found",
            RuntimeError::Conflict(_) => "conflict",
            RuntimeError::Validation(_) => "validation_failed",
            RuntimeError::Busy(_) => "busy",
            RuntimeError::Timeout(_) => "timeout",
            RuntimeError::Engine(_) => "engine_error",
            RuntimeError::Transient(_) => "transient",
            RuntimeError::Fatal(_) => "fatal",
        }
    }

    /// Whether automatic retry applies.
    pub fn is_transient(&self) -> bool {
        matches!(self, RuntimeError::Transient(_) | RuntimeError::Timeout(_))
    }
}
