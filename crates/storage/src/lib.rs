// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional persistence for the application registry.
//!
//! One SQLite database (`apps.sqlite`) holds applications, runtime state,
//! captured log lines, declared dependencies, and deploy history. All writes
//! commit before the call returns; per-application write ordering is
//! guaranteed by the app manager's per-id gate above this crate.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod logs;
mod rows;
mod schema;
mod state;
mod store;

pub use error::StoreError;
pub use logs::LogQuery;
pub use store::{AppFilter, DeployRecord, Store};
