// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable engine double for tests.
//!
//! Containers are plain records; tests drive them with [`FakeEngine::push_log`]
//! and [`FakeEngine::script_exit`], and can make the next operation fail with
//! [`FakeEngine::fail_next`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use sdv_core::LogStreamKind;
use tokio::sync::{mpsc, watch};

use crate::docker::{
    CliOutput, ContainerEngine, ContainerSpec, ContainerState, EngineError, ExitInfo, LogChunk,
    StatsSnapshot, LABEL_APP_ID, LABEL_RUNTIME, LABEL_RUNTIME_VALUE,
};

struct FakeContainer {
    state: ContainerState,
    history: Vec<LogChunk>,
    live_tx: Option<mpsc::UnboundedSender<LogChunk>>,
    exit_tx: watch::Sender<Option<i64>>,
    stats: StatsSnapshot,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    next_id: u64,
    fail_next: VecDeque<(String, String)>,
    cli_calls: Vec<Vec<String>>,
    cli_script: VecDeque<Result<CliOutput, String>>,
}

/// In-memory engine double.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_failure(&self, op: &str) -> Option<String> {
        let mut state = self.inner.lock();
        if state.fail_next.front().map(|(o, _)| o == op).unwrap_or(false) {
            return state.fail_next.pop_front().map(|(_, msg)| msg);
        }
        None
    }

    /// Make the next call to `op` (create/start/stop/...) fail.
    pub fn fail_next(&self, op: &str, message: &str) {
        self.inner.lock().fail_next.push_back((op.to_string(), message.to_string()));
    }

    /// Feed raw log bytes to a container's stream.
    pub fn push_log(&self, id: &str, stream: LogStreamKind, bytes: &[u8]) {
        let mut state = self.inner.lock();
        if let Some(container) = state.containers.get_mut(id) {
            let chunk = LogChunk { stream, bytes: bytes.to_vec() };
            container.history.push(chunk.clone());
            if let Some(tx) = &container.live_tx {
                let _ = tx.send(chunk);
            }
        }
    }

    /// Mark a container exited; wakes `wait()` and ends its log stream.
    pub fn script_exit(&self, id: &str, code: i64) {
        let mut state = self.inner.lock();
        if let Some(container) = state.containers.get_mut(id) {
            container.state.running = false;
            container.state.paused = false;
            container.state.exit_code = Some(code);
            container.state.finished_at = Some(chrono::Utc::now());
            container.live_tx = None;
            let _ = container.exit_tx.send(Some(code));
        }
    }

    /// Set the stats returned for a container.
    pub fn set_stats(&self, id: &str, stats: StatsSnapshot) {
        let mut state = self.inner.lock();
        if let Some(container) = state.containers.get_mut(id) {
            container.stats = stats;
        }
    }

    /// Script the result of the next `run_cli` call.
    pub fn script_cli(&self, result: Result<CliOutput, &str>) {
        self.inner.lock().cli_script.push_back(result.map_err(str::to_string));
    }

    /// CLI invocations observed so far.
    pub fn cli_calls(&self) -> Vec<Vec<String>> {
        self.inner.lock().cli_calls.clone()
    }

    /// Whether a container id is still registered.
    pub fn exists(&self, id: &str) -> bool {
        self.inner.lock().containers.contains_key(id)
    }

    /// Register a container as if it pre-existed (reboot scenarios).
    pub fn seed_container(&self, id: &str, app_id: &str, running: bool) {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_RUNTIME.to_string(), LABEL_RUNTIME_VALUE.to_string());
        labels.insert(LABEL_APP_ID.to_string(), app_id.to_string());
        let (exit_tx, _) = watch::channel(None);
        let mut state = self.inner.lock();
        state.containers.insert(
            id.to_string(),
            FakeContainer {
                state: ContainerState {
                    id: id.to_string(),
                    running,
                    started_at: running.then(chrono::Utc::now),
                    labels,
                    ..Default::default()
                },
                history: Vec::new(),
                live_tx: None,
                exit_tx,
                stats: StatsSnapshot::default(),
            },
        );
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        if let Some(msg) = self.take_failure("create") {
            return Err(EngineError::Rejected(msg));
        }
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = format!("fake-{:08x}", state.next_id);
        let (exit_tx, _) = watch::channel(None);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                state: ContainerState {
                    id: id.clone(),
                    labels: spec.labels.clone(),
                    ..Default::default()
                },
                history: Vec::new(),
                live_tx: None,
                exit_tx,
                stats: StatsSnapshot::default(),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        if let Some(msg) = self.take_failure("start") {
            return Err(EngineError::Rejected(msg));
        }
        let mut state = self.inner.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        container.state.running = true;
        container.state.started_at = Some(chrono::Utc::now());
        container.state.pid = Some(40_000 + id.len() as i64);
        Ok(())
    }

    async fn stop(&self, id: &str, _grace: Duration) -> Result<(), EngineError> {
        if let Some(msg) = self.take_failure("stop") {
            return Err(EngineError::Rejected(msg));
        }
        if !self.exists(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }
        // A graceful stop looks like a SIGTERM exit.
        self.script_exit(id, 0);
        Ok(())
    }

    async fn remove(&self, id: &str, _force: bool) -> Result<(), EngineError> {
        if let Some(msg) = self.take_failure("remove") {
            return Err(EngineError::Rejected(msg));
        }
        self.inner
            .lock()
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, EngineError> {
        self.inner
            .lock()
            .containers
            .get(id)
            .map(|c| c.state.clone())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn wait(&self, id: &str) -> Result<ExitInfo, EngineError> {
        let mut rx = {
            let state = self.inner.lock();
            let container = state
                .containers
                .get(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            container.exit_tx.subscribe()
        };
        loop {
            if let Some(code) = *rx.borrow() {
                return Ok(ExitInfo { exit_code: Some(code) });
            }
            if rx.changed().await.is_err() {
                return Ok(ExitInfo { exit_code: None });
            }
        }
    }

    async fn pause(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        container.state.paused = true;
        Ok(())
    }

    async fn unpause(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.inner.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        container.state.paused = false;
        Ok(())
    }

    async fn logs(
        &self,
        id: &str,
        follow: bool,
        tail: Option<usize>,
    ) -> Result<BoxStream<'static, Result<LogChunk, EngineError>>, EngineError> {
        let (replay, live_rx) = {
            let mut state = self.inner.lock();
            let container = state
                .containers
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            let start = tail
                .map(|n| container.history.len().saturating_sub(n))
                .unwrap_or(0);
            let replay: Vec<LogChunk> = container.history[start..].to_vec();
            let live_rx = if follow && container.state.exit_code.is_none() {
                let (tx, rx) = mpsc::unbounded_channel();
                container.live_tx = Some(tx);
                Some(rx)
            } else {
                None
            };
            (replay, live_rx)
        };

        let replayed = futures_util::stream::iter(replay.into_iter().map(Ok));
        match live_rx {
            Some(rx) => {
                let live = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|chunk| (Ok(chunk), rx))
                });
                Ok(replayed.chain(live).boxed())
            }
            None => Ok(replayed.boxed()),
        }
    }

    async fn stats(&self, id: &str) -> Result<StatsSnapshot, EngineError> {
        self.inner
            .lock()
            .containers
            .get(id)
            .map(|c| c.stats)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    async fn list_by_label(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<ContainerState>, EngineError> {
        let state = self.inner.lock();
        let mut states: Vec<ContainerState> = state
            .containers
            .values()
            .filter(|c| c.state.labels.get(key).map(String::as_str) == Some(value))
            .map(|c| c.state.clone())
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CliOutput, EngineError> {
        if !self.exists(id) {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.inner.lock().cli_calls.push(cmd);
        Ok(CliOutput::default())
    }

    async fn run_cli(&self, tokens: &[String]) -> Result<CliOutput, EngineError> {
        let scripted = {
            let mut state = self.inner.lock();
            state.cli_calls.push(tokens.to_vec());
            state.cli_script.pop_front()
        };
        match scripted {
            Some(Ok(output)) => {
                // Run-style scripted output registers the container so
                // follow-up lifecycle calls work like the real engine.
                if let Some(id) = &output.container_id {
                    let app_label = tokens
                        .iter()
                        .position(|t| t == "--label")
                        .and_then(|i| tokens.get(i + 1))
                        .and_then(|l| l.strip_prefix("appId="))
                        .unwrap_or("cli");
                    self.seed_container(id, app_label, true);
                }
                Ok(output)
            }
            Some(Err(msg)) => Err(EngineError::Rejected(msg)),
            None => {
                // Default behavior: run-style commands mint a container.
                let verb = tokens.iter().find(|t| !t.starts_with('-')).cloned();
                if matches!(verb.as_deref(), Some("run") | Some("create")) {
                    let id = format!("{:064x}", self.inner.lock().cli_calls.len());
                    self.seed_container(&id, "cli", verb.as_deref() == Some("run"));
                    Ok(CliOutput {
                        stdout: id.clone(),
                        container_id: Some(id),
                        ..Default::default()
                    })
                } else {
                    Ok(CliOutput::default())
                }
            }
        }
    }
}
