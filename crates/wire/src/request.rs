// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request frames accepted on the local channel (and, unwrapped, from the hub).

use std::collections::BTreeMap;

use sdv_core::{AppType, ResourceLimits, RestartPolicy};
use serde::{Deserialize, Serialize};

/// Lifecycle action on a deployed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManageAction {
    Start,
    Stop,
    Restart,
    Pause,
    Resume,
    Remove,
}

impl ManageAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ManageAction::Start => "start",
            ManageAction::Stop => "stop",
            ManageAction::Restart => "restart",
            ManageAction::Pause => "pause",
            ManageAction::Resume => "resume",
            ManageAction::Remove => "remove",
        }
    }
}

/// Action on a managed sidecar (mock service, kuksa broker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidecarAction {
    Start,
    Stop,
    Restart,
}

/// Application description carried in a `deploy_request`.
///
/// Field names follow the original client wire shape (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prototype {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub app_type: AppType,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default)]
    pub binary_path: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub python_deps: Vec<String>,
    #[serde(default)]
    pub vehicle_signals: Vec<String>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub resources: ResourceLimits,
}

/// Requests accepted by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Health check
    Ping,

    /// Runtime identity, status, and capabilities
    GetRuntimeInfo,

    /// Create + install (+ start) an application
    DeployRequest {
        prototype: Prototype,
        #[serde(rename = "vehicleId", default, skip_serializing_if = "Option::is_none")]
        vehicle_id: Option<String>,
        /// Python source, alternative to `prototype.code`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// List registered applications with counts
    ListDeployedApps,

    /// Lifecycle action on one application
    ManageApp {
        #[serde(rename = "appId")]
        app_id: String,
        action: ManageAction,
    },

    /// Convenience for `manage_app action=stop`
    StopApp {
        #[serde(rename = "appId")]
        app_id: String,
    },

    /// Current runtime state of one application
    GetAppStatus {
        #[serde(rename = "appId")]
        app_id: String,
    },

    /// Attach a log subscription; replays the newest buffered lines
    AppLogSubscribe {
        #[serde(rename = "appId")]
        app_id: String,
    },

    /// Detach one subscription, or all when `appId` is omitted
    AppLogUnsubscribe {
        #[serde(rename = "appId", default, skip_serializing_if = "Option::is_none")]
        app_id: Option<String>,
    },

    /// Subscribe to vehicle signal updates
    VehicleSignalSubscribe { paths: Vec<String> },

    /// Drop a signal subscription
    VehicleSignalUnsubscribe {
        #[serde(rename = "subscriptionId")]
        subscription_id: String,
    },

    /// Read current signal values
    VehicleSignalGet { paths: Vec<String> },

    /// Write signal values
    VehicleSignalSet {
        updates: BTreeMap<String, serde_json::Value>,
    },

    /// Sidecar mock provider status
    MockServiceStatus,

    /// Start the mock provider sidecar
    MockServiceStart,

    /// Stop the mock provider sidecar
    MockServiceStop,

    /// Reconfigure the mock provider sidecar
    MockServiceConfigure {
        config: serde_json::Map<String, serde_json::Value>,
    },

    /// Manage the vehicle broker sidecar
    KuksaServerDeployment { action: SidecarAction },
}

impl ClientRequest {
    /// The wire `type` tag, used for building `<type>-response` names and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientRequest::Ping => "ping",
            ClientRequest::GetRuntimeInfo => "get_runtime_info",
            ClientRequest::DeployRequest { .. } => "deploy_request",
            ClientRequest::ListDeployedApps => "list_deployed_apps",
            ClientRequest::ManageApp { .. } => "manage_app",
            ClientRequest::StopApp { .. } => "stop_app",
            ClientRequest::GetAppStatus { .. } => "get_app_status",
            ClientRequest::AppLogSubscribe { .. } => "app_log_subscribe",
            ClientRequest::AppLogUnsubscribe { .. } => "app_log_unsubscribe",
            ClientRequest::VehicleSignalSubscribe { .. } => "vehicle_signal_subscribe",
            ClientRequest::VehicleSignalUnsubscribe { .. } => "vehicle_signal_unsubscribe",
            ClientRequest::VehicleSignalGet { .. } => "vehicle_signal_get",
            ClientRequest::VehicleSignalSet { .. } => "vehicle_signal_set",
            ClientRequest::MockServiceStatus => "mock_service_status",
            ClientRequest::MockServiceStart => "mock_service_start",
            ClientRequest::MockServiceStop => "mock_service_stop",
            ClientRequest::MockServiceConfigure { .. } => "mock_service_configure",
            ClientRequest::KuksaServerDeployment { .. } => "kuksa_server_deployment",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
