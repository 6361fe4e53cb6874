// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain types shared across the vehicle edge runtime.
//!
//! Everything here is transport- and storage-agnostic: application records,
//! the lifecycle state machine, log lines, credentials, runtime events, and
//! the error taxonomy surfaced on the wire.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod app;
mod clock;
mod credential;
mod error;
mod event;
pub mod ids;
mod log;
mod state;

pub use app::{
    AppType, Application, ApplicationPatch, Dependency, DependencyKind, ResourceLimits,
    RestartPolicy,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use credential::VehicleCredential;
pub use error::RuntimeError;
pub use event::{BreachSeverity, Event};
pub use ids::{AppId, ClientId, ExecutionId, SubscriptionId};
pub use log::{clamp_log_content, LogLine, LogStreamKind, MAX_LOG_CONTENT_BYTES};
pub use state::{LifecycleState, ResourceSample, RuntimeState, RuntimeStatePatch};
