// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response and push frames emitted by the runtime.

use chrono::{DateTime, Utc};
use sdv_core::{AppType, LifecycleState, RuntimeState};
use serde::{Deserialize, Serialize};

/// Deploy result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployOutcome {
    Started,
    Failed,
}

/// One application in a `list_deployed_apps-response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub app_type: AppType,
    pub status: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub auto_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Frames sent from the runtime to a client.
///
/// Response tags are `<request type>-response`; pushes use their own tags.
/// The correlation `id` is injected by [`crate::encode_reply`], not stored
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Reply to `ping`
    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "get_runtime_info-response")]
    RuntimeInfo {
        #[serde(rename = "runtimeId")]
        runtime_id: String,
        /// `ok`, or `degraded` while the broker connection is down
        status: String,
        capabilities: Vec<String>,
        port: u16,
    },

    #[serde(rename = "deploy_request-response")]
    Deploy {
        #[serde(rename = "executionId")]
        execution_id: String,
        #[serde(rename = "appId")]
        app_id: String,
        status: DeployOutcome,
        result: String,
        #[serde(rename = "isDone")]
        is_done: bool,
        code: i64,
        kit_id: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "list_deployed_apps-response")]
    DeployedApps {
        applications: Vec<AppSummary>,
        total_count: usize,
        running_count: usize,
    },

    #[serde(rename = "manage_app-response")]
    ManageApp {
        #[serde(rename = "appId")]
        app_id: String,
        action: String,
        state: LifecycleState,
    },

    #[serde(rename = "stop_app-response")]
    StopApp {
        #[serde(rename = "appId")]
        app_id: String,
        state: LifecycleState,
    },

    #[serde(rename = "get_app_status-response")]
    AppStatus {
        #[serde(rename = "appId")]
        app_id: String,
        state: Box<RuntimeState>,
    },

    #[serde(rename = "app_log_subscribe-response")]
    LogSubscribed {
        #[serde(rename = "appId")]
        app_id: String,
        replayed: usize,
    },

    #[serde(rename = "app_log_unsubscribe-response")]
    LogUnsubscribed { removed: usize },

    /// Streaming log line push
    #[serde(rename = "app_output")]
    AppOutput {
        app_id: String,
        output_type: sdv_core::LogStreamKind,
        timestamp: DateTime<Utc>,
        content: String,
    },

    #[serde(rename = "vehicle_signal_subscribe-response")]
    SignalSubscribed {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
        paths: Vec<String>,
    },

    #[serde(rename = "vehicle_signal_unsubscribe-response")]
    SignalUnsubscribed { removed: bool },

    #[serde(rename = "vehicle_signal_get-response")]
    SignalValues {
        values: std::collections::BTreeMap<String, serde_json::Value>,
        /// True while values come from a cache the broker has not refreshed
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        stale: bool,
    },

    #[serde(rename = "vehicle_signal_set-response")]
    SignalSetAck { ack: bool },

    /// Signal update push
    #[serde(rename = "signals_updated")]
    SignalsUpdated {
        updates: std::collections::BTreeMap<String, serde_json::Value>,
    },

    /// Resource threshold breach push
    #[serde(rename = "threshold_breach")]
    ThresholdBreach {
        app_id: String,
        resource: String,
        value: f64,
        limit: f64,
        severity: sdv_core::BreachSeverity,
    },

    #[serde(rename = "mock_service_status-response")]
    MockServiceStatus {
        running: bool,
        state: LifecycleState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<serde_json::Map<String, serde_json::Value>>,
    },

    #[serde(rename = "mock_service_start-response")]
    MockServiceStarted { state: LifecycleState },

    #[serde(rename = "mock_service_stop-response")]
    MockServiceStopped { state: LifecycleState },

    #[serde(rename = "mock_service_configure-response")]
    MockServiceConfigured { restarted: bool },

    #[serde(rename = "kuksa_server_deployment-response")]
    KuksaServer { action: String, state: LifecycleState },

    /// Error reply (any request type)
    #[serde(rename = "error")]
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
}

impl ServerMessage {
    /// Build an error frame from a runtime error.
    pub fn from_error(err: &sdv_core::RuntimeError) -> Self {
        ServerMessage::Error {
            error: err.to_string(),
            kind: Some(err.kind().to_string()),
        }
    }

    /// Build an `app_output` push from a stored log line.
    pub fn from_log_line(line: &sdv_core::LogLine) -> Self {
        ServerMessage::AppOutput {
            app_id: line.app_id.to_string(),
            output_type: line.stream,
            timestamp: line.timestamp,
            content: line.content.clone(),
        }
    }
}
