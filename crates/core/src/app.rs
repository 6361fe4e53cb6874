// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application records and install-time validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AppId;
use crate::state::LifecycleState;

/// Kind of workload an application describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Python,
    Binary,
    /// Raw container command, forwarded verbatim to the engine CLI.
    /// Clients may also send the legacy spelling `docker`.
    #[serde(alias = "docker")]
    Container,
}

impl AppType {
    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Python => "python",
            AppType::Binary => "binary",
            AppType::Container => "container",
        }
    }
}

impl std::str::FromStr for AppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python" => Ok(AppType::Python),
            "binary" => Ok(AppType::Binary),
            "container" | "docker" => Ok(AppType::Container),
            other => Err(format!("unknown application type: {other}")),
        }
    }
}

/// What to do when the container exits non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    #[default]
    Never,
    OnFailure,
    Always,
}

impl RestartPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::Never => "never",
            RestartPolicy::OnFailure => "on_failure",
            RestartPolicy::Always => "always",
        }
    }
}

impl std::str::FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(RestartPolicy::Never),
            "on_failure" => Ok(RestartPolicy::OnFailure),
            "always" => Ok(RestartPolicy::Always),
            other => Err(format!("unknown restart policy: {other}")),
        }
    }
}

/// Optional resource caps applied to the spawned container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU quota in microseconds per scheduler period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit_us: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_bytes: Option<i64>,
}

/// The primary persisted record describing a deployed workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: AppId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub app_type: AppType,
    /// Source text; only meaningful for python applications.
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
    /// Local working directory assigned at install; None for container type.
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Semi-structured configuration. For container type MUST contain
    /// `dockerCommand` as a non-empty token array.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    pub status: LifecycleState,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub resources: ResourceLimits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Check the per-type field requirements enforced at install time.
    pub fn validate(&self) -> Result<(), String> {
        match self.app_type {
            AppType::Python => {
                if self.entry_point.as_deref().map_or(true, str::is_empty) {
                    return Err("python application requires entry_point".into());
                }
                if self.code.as_deref().map_or(true, str::is_empty) {
                    return Err("python application requires code".into());
                }
            }
            AppType::Binary => {
                if self.binary_path.as_deref().map_or(true, str::is_empty) {
                    return Err("binary application requires binary_path".into());
                }
            }
            AppType::Container => {
                if self.docker_command().map_or(true, |t| t.is_empty()) {
                    return Err("container application requires config.dockerCommand".into());
                }
            }
        }
        Ok(())
    }

    /// The `config.dockerCommand` token list, if present.
    pub fn docker_command(&self) -> Option<Vec<String>> {
        let tokens = self.config.get("dockerCommand")?.as_array()?;
        Some(tokens.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
    }
}

/// Partial update applied to a persisted [`Application`].
///
/// `None` leaves the column untouched. `updated_at` is bumped by the store
/// on every successful patch.
#[derive(Debug, Clone, Default)]
pub struct ApplicationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub code: Option<String>,
    pub entry_point: Option<String>,
    pub binary_path: Option<String>,
    pub working_dir: Option<String>,
    pub args: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub python_deps: Option<Vec<String>>,
    pub vehicle_signals: Option<Vec<String>>,
    pub data_path: Option<Option<PathBuf>>,
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
    pub status: Option<LifecycleState>,
    pub auto_start: Option<bool>,
    pub restart_policy: Option<RestartPolicy>,
    pub resources: Option<ResourceLimits>,
}

/// A declared dependency of an application, recorded for prechecks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub app_id: AppId,
    pub kind: DependencyKind,
    pub name: String,
    #[serde(default)]
    pub version_spec: Option<String>,
    #[serde(default)]
    pub resolved_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    PythonPkg,
    VehicleSignal,
}

impl DependencyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::PythonPkg => "python_pkg",
            DependencyKind::VehicleSignal => "vehicle_signal",
        }
    }
}

impl std::str::FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "python_pkg" => Ok(DependencyKind::PythonPkg),
            "vehicle_signal" => Ok(DependencyKind::VehicleSignal),
            other => Err(format!("unknown dependency kind: {other}")),
        }
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
