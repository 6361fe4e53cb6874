// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed facade over the container engine.
//!
//! Every component reaches the engine through [`ContainerEngine`].
//! [`LiveEngine`] is the bollard-backed implementation; [`FakeEngine`] is a
//! scriptable test double. `container`-type applications bypass the typed
//! spec entirely through [`ContainerEngine::run_cli`], which forwards
//! `docker <tokens>` verbatim.

mod cli;
mod fake;
mod live;

pub use fake::FakeEngine;
pub use live::LiveEngine;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use sdv_core::{LogStreamKind, RuntimeError};
use thiserror::Error;

/// Label identifying containers owned by this runtime.
pub const LABEL_RUNTIME: &str = "runtime";
pub const LABEL_RUNTIME_VALUE: &str = "vehicle-edge";
/// Label carrying the owning application id.
pub const LABEL_APP_ID: &str = "appId";

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("container {0} not found")]
    NotFound(String),

    #[error("name conflict: {0}")]
    Conflict(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine rejected operation: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for RuntimeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => RuntimeError::NotFound(format!("container {id}")),
            EngineError::Conflict(m) => RuntimeError::Conflict(m),
            EngineError::Unavailable(m) => RuntimeError::Transient(m),
            EngineError::Rejected(m) => RuntimeError::Engine(m),
            EngineError::Io(e) => RuntimeError::Transient(e.to_string()),
        }
    }
}

/// One bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// Networking mode for a created container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    Host,
    /// A named bridge network.
    Bridge(String),
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::Bridge("bridge".to_string())
    }
}

/// Everything needed to create a container, without engine vocabulary.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub name: Option<String>,
    pub image: String,
    /// Command plus arguments; empty keeps the image default.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub binds: Vec<Bind>,
    pub memory_limit_bytes: Option<i64>,
    /// CPU quota in microseconds per 100ms period.
    pub cpu_quota_us: Option<i64>,
    pub network: Option<NetworkMode>,
    pub read_only_root: bool,
    pub tmpfs: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// Attach the runtime ownership labels.
    pub fn labeled_for(mut self, app_id: &sdv_core::AppId) -> Self {
        self.labels.insert(LABEL_RUNTIME.to_string(), LABEL_RUNTIME_VALUE.to_string());
        self.labels.insert(LABEL_APP_ID.to_string(), app_id.to_string());
        self
    }
}

/// Observed container state from inspect/list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
    pub paused: bool,
    pub exit_code: Option<i64>,
    pub pid: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl ContainerState {
    pub fn app_id(&self) -> Option<&str> {
        self.labels.get(LABEL_APP_ID).map(String::as_str)
    }
}

/// Result of waiting for a container to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// None when the engine lost the container.
    pub exit_code: Option<i64>,
}

/// One chunk of raw log bytes from a container stream. Chunks may split
/// lines arbitrarily; the log hub reassembles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub stream: LogStreamKind,
    pub bytes: Vec<u8>,
}

/// One raw stats reading. Carries the previous CPU counters so a single
/// reading suffices to compute a usage percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub cpu_total_usage: u64,
    pub precpu_total_usage: u64,
    pub system_cpu_usage: u64,
    pub pre_system_cpu_usage: u64,
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub block_read_bytes: u64,
    pub block_write_bytes: u64,
    pub pids: Option<u64>,
}

/// Output of a CLI passthrough invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    /// Printed container id, captured for run-style invocations.
    pub container_id: Option<String>,
}

/// Async interface to the container engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Create a container; returns its id.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start(&self, id: &str) -> Result<(), EngineError>;

    /// Graceful stop with a kill after `grace`.
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError>;

    async fn remove(&self, id: &str, force: bool) -> Result<(), EngineError>;

    async fn inspect(&self, id: &str) -> Result<ContainerState, EngineError>;

    /// Resolve when the container exits.
    async fn wait(&self, id: &str) -> Result<ExitInfo, EngineError>;

    async fn pause(&self, id: &str) -> Result<(), EngineError>;

    async fn unpause(&self, id: &str) -> Result<(), EngineError>;

    /// Raw log byte stream. `tail` limits the replayed history.
    async fn logs(
        &self,
        id: &str,
        follow: bool,
        tail: Option<usize>,
    ) -> Result<BoxStream<'static, Result<LogChunk, EngineError>>, EngineError>;

    async fn stats(&self, id: &str) -> Result<StatsSnapshot, EngineError>;

    async fn list_by_label(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<ContainerState>, EngineError>;

    /// Run a command inside a running container, collecting output.
    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CliOutput, EngineError>;

    /// Forward `docker <tokens>` verbatim. Does not construct a spec.
    async fn run_cli(&self, tokens: &[String]) -> Result<CliOutput, EngineError>;
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
