// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime events flowing between components.
//!
//! Events are facts about what happened. Producers push them onto bounded
//! mpsc channels owned by the runtime root; the local server and hub bridge
//! fan the subscriber-facing ones out to clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{AppId, ExecutionId};

/// Severity attached to a resource threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachSeverity {
    Warning,
    Critical,
}

/// Events emitted by runtime components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Container exists on the engine; id persisted, log tail attached next.
    ContainerCreated {
        app_id: AppId,
        execution_id: ExecutionId,
        container_id: String,
    },

    /// Container entered the running state.
    ContainerStarted {
        app_id: AppId,
        execution_id: ExecutionId,
    },

    /// Container exited; `exit_code` is None when the engine lost it.
    ContainerExited {
        app_id: AppId,
        execution_id: ExecutionId,
        exit_code: Option<i64>,
    },

    /// A supervised start failed before the container ran.
    StartFailed {
        app_id: AppId,
        execution_id: ExecutionId,
        message: String,
    },

    /// Resource monitor observed a threshold crossing.
    ThresholdBreach {
        app_id: AppId,
        resource: String,
        value: f64,
        limit: f64,
        severity: BreachSeverity,
    },

    /// Vehicle signal values changed at the broker.
    SignalsUpdated {
        updates: BTreeMap<String, serde_json::Value>,
    },

    /// Broker connectivity changed; drives the degraded runtime status.
    BrokerConnection { connected: bool },
}
