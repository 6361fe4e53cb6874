// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sdv_core::RuntimeError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("application {0} not found")]
    NotFound(String),

    #[error("application {0} already exists")]
    Conflict(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RuntimeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RuntimeError::NotFound(format!("application {id}")),
            StoreError::Conflict(id) => {
                RuntimeError::Conflict(format!("application {id} already exists"))
            }
            StoreError::Sqlite(e) => RuntimeError::Fatal(format!("store: {e}")),
            StoreError::Corrupt(m) => RuntimeError::Fatal(format!("store corruption: {m}")),
            StoreError::Io(e) => RuntimeError::Transient(format!("store io: {e}")),
        }
    }
}
