// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle state machine and per-execution runtime state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AppId, ExecutionId};

/// State of an application's lifecycle.
///
/// `Application.status` mirrors the supervisor's `RuntimeState.current_state`;
/// both are written in the same store transaction so observers never see them
/// diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installed,
    Starting,
    Running,
    Stopping,
    Stopped,
    Paused,
    Error,
}

impl LifecycleState {
    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// `Error` is reachable from anywhere. `Stopped` and `Error` allow a
    /// fresh `Starting` so stopped or failed applications can be started
    /// again without reinstalling.
    pub fn can_transition(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        if to == Error {
            return true;
        }
        match self {
            Installed => matches!(to, Starting),
            Starting => matches!(to, Starting | Running | Installed | Stopping),
            Running => matches!(to, Stopping | Stopped | Installed | Starting | Paused),
            Stopping => matches!(to, Stopped),
            Stopped => matches!(to, Starting | Installed),
            Paused => matches!(to, Running | Stopping),
            Error => matches!(to, Starting | Installed),
        }
    }

    /// Terminal states: nothing happens without an external command.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Error)
    }

    pub fn is_active(self) -> bool {
        matches!(
            self,
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::Stopping
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Installed => "installed",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Paused => "paused",
            LifecycleState::Error => "error",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installed" => Ok(LifecycleState::Installed),
            "starting" => Ok(LifecycleState::Starting),
            "running" => Ok(LifecycleState::Running),
            "stopping" => Ok(LifecycleState::Stopping),
            "stopped" => Ok(LifecycleState::Stopped),
            "paused" => Ok(LifecycleState::Paused),
            "error" => Ok(LifecycleState::Error),
            other => Err(format!("unknown lifecycle state: {other}")),
        }
    }
}

/// One sampled resource snapshot for a running container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub block_read_bytes: u64,
    pub block_write_bytes: u64,
    pub pids: Option<u64>,
    pub sampled_at: Option<DateTime<Utc>>,
}

/// Transient state of the current (or last) execution of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub app_id: AppId,
    pub execution_id: Option<ExecutionId>,
    pub container_id: Option<String>,
    pub pid: Option<i64>,
    pub last_start: Option<DateTime<Utc>>,
    pub last_exit: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    /// Accumulated seconds across all completed executions.
    pub total_runtime_secs: u64,
    pub current_state: LifecycleState,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub resources: Option<ResourceSample>,
}

impl RuntimeState {
    /// Fresh state for a newly installed application.
    pub fn installed(app_id: AppId) -> Self {
        Self {
            app_id,
            execution_id: None,
            container_id: None,
            pid: None,
            last_start: None,
            last_exit: None,
            exit_code: None,
            total_runtime_secs: 0,
            current_state: LifecycleState::Installed,
            last_heartbeat: None,
            resources: None,
        }
    }
}

/// Partial update applied to a persisted [`RuntimeState`].
///
/// `None` leaves a field untouched; the nested options write NULL.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStatePatch {
    pub execution_id: Option<Option<ExecutionId>>,
    pub container_id: Option<Option<String>>,
    pub pid: Option<Option<i64>>,
    pub last_start: Option<DateTime<Utc>>,
    pub last_exit: Option<DateTime<Utc>>,
    pub exit_code: Option<Option<i64>>,
    pub add_runtime_secs: Option<u64>,
    pub current_state: Option<LifecycleState>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub resources: Option<ResourceSample>,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
