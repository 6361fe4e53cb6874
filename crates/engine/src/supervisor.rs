// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-application lifecycle supervisor.
//!
//! One supervisor drives one application through the state machine. All of
//! its methods run under the app manager's per-id gate, so transitions are
//! serialized; container exits arrive later as events and come back through
//! [`Supervisor::handle_exit`] under the same gate.
//!
//! Store writes happen *before* the external action they announce
//! (`Stopping` is committed before the engine stop is issued); convergence
//! with the real container state is driven by the exit watcher.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sdv_core::{
    AppId, AppType, Application, Event, ExecutionId, LifecycleState, RestartPolicy, RuntimeError,
    RuntimeStatePatch,
};
use sdv_storage::Store;
use tokio::sync::mpsc;

use crate::docker::{Bind, ContainerEngine, ContainerSpec, NetworkMode};
use crate::loghub::LogHub;
use crate::paths::StoragePaths;
use crate::vault::CredentialVault;
use crate::{deps, vault::VaultError};

/// Graceful stop timeout.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// Restart backoff: 1s doubling to 60s, at most 10 attempts per 10 minutes.
const RESTART_INITIAL: Duration = Duration::from_secs(1);
const RESTART_CAP: Duration = Duration::from_secs(60);
const RESTART_WINDOW: Duration = Duration::from_secs(600);
const RESTART_MAX_ATTEMPTS: usize = 10;

/// Shared dependencies handed to every supervisor.
#[derive(Clone)]
pub struct SupervisorCtx {
    pub store: Store,
    pub engine: Arc<dyn ContainerEngine>,
    pub hub: LogHub,
    pub vault: Arc<CredentialVault>,
    pub paths: StoragePaths,
    pub event_tx: mpsc::Sender<Event>,
    /// Advertised to applications as `KUKSA_SERVER_URL`.
    pub broker_url: String,
}

/// Sliding-window restart budget.
#[derive(Debug, Default)]
pub(crate) struct RestartWindow {
    attempts: VecDeque<Instant>,
}

impl RestartWindow {
    /// Delay before the next restart attempt, or `None` when the budget for
    /// the window is exhausted.
    pub(crate) fn next_delay(&mut self, now: Instant) -> Option<Duration> {
        while let Some(first) = self.attempts.front() {
            if now.duration_since(*first) > RESTART_WINDOW {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
        if self.attempts.len() >= RESTART_MAX_ATTEMPTS {
            return None;
        }
        let exponent = self.attempts.len() as u32;
        self.attempts.push_back(now);
        let delay = RESTART_INITIAL
            .checked_mul(1u32 << exponent.min(6))
            .unwrap_or(RESTART_CAP);
        Some(delay.min(RESTART_CAP))
    }

    pub(crate) fn reset(&mut self) {
        self.attempts.clear();
    }
}

/// What the manager should do after an exit was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Terminal; nothing more to do.
    Settled(LifecycleState),
    /// Schedule a restart after the delay.
    Restart(Duration),
}

pub struct Supervisor {
    app_id: AppId,
    ctx: SupervisorCtx,
    current_exec: Option<ExecutionId>,
    restarts: RestartWindow,
    /// Vehicle used on the last explicit start; restarts reuse it so
    /// credential injection survives restart loops.
    last_vehicle: Option<String>,
}

impl Supervisor {
    pub fn new(app_id: AppId, ctx: SupervisorCtx) -> Self {
        Self {
            app_id,
            ctx,
            current_exec: None,
            restarts: RestartWindow::default(),
            last_vehicle: None,
        }
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Reattach to a container that survived a runtime restart.
    pub fn adopt(&mut self, execution_id: ExecutionId, container_id: &str) {
        self.current_exec = Some(execution_id.clone());
        self.ctx.hub.attach_container(&self.app_id, container_id, Arc::clone(&self.ctx.engine));
        self.spawn_exit_watcher(execution_id, container_id.to_string());
    }

    /// Drive the application to `Running`.
    ///
    /// Already starting/running executions are left alone and their id is
    /// returned, making `start` idempotent.
    pub async fn start(
        &mut self,
        vehicle_id: Option<&str>,
    ) -> Result<ExecutionId, RuntimeError> {
        let vehicle = vehicle_id.map(str::to_string).or_else(|| self.last_vehicle.clone());
        self.last_vehicle = vehicle.clone();
        let app = self.ctx.store.get_application(&self.app_id).map_err(RuntimeError::from)?;
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;

        if matches!(state.current_state, LifecycleState::Starting | LifecycleState::Running) {
            if let Some(exec) = &self.current_exec {
                return Ok(exec.clone());
            }
        }
        if state.current_state == LifecycleState::Stopping {
            return Err(RuntimeError::Busy(format!("{} is stopping", self.app_id)));
        }
        if !state.current_state.can_transition(LifecycleState::Starting) {
            return Err(RuntimeError::Validation(format!(
                "cannot start {} from state {}",
                self.app_id, state.current_state
            )));
        }

        // A previous execution's container may be lingering for diagnostics.
        if let Some(old) = &state.container_id {
            self.ctx.hub.detach_container(&self.app_id);
            let _ = self.ctx.engine.remove(old, true).await;
        }

        let execution_id = ExecutionId::new();
        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    execution_id: Some(Some(execution_id.clone())),
                    container_id: Some(None),
                    pid: Some(None),
                    current_state: Some(LifecycleState::Starting),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        let _ = self.ctx.store.record_deploy(
            &self.app_id,
            Some(&execution_id),
            "start",
            None,
            Utc::now(),
        );

        match self.launch(&app, &execution_id, vehicle.as_deref()).await {
            Ok(()) => {
                self.current_exec = Some(execution_id.clone());
                Ok(execution_id)
            }
            Err(e) => {
                self.fail(&execution_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// The fallible part of `start`: materialize, create, run, watch.
    async fn launch(
        &mut self,
        app: &Application,
        execution_id: &ExecutionId,
        vehicle_id: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let container_id = match app.app_type {
            AppType::Container => self.launch_cli(app).await?,
            AppType::Python | AppType::Binary => {
                self.launch_spec(app, execution_id, vehicle_id).await?
            }
        };

        if let Some(container_id) = &container_id {
            self.ctx
                .store
                .upsert_runtime_state(
                    &self.app_id,
                    &RuntimeStatePatch {
                        container_id: Some(Some(container_id.clone())),
                        ..Default::default()
                    },
                )
                .map_err(RuntimeError::from)?;
            let _ = self
                .ctx
                .event_tx
                .send(Event::ContainerCreated {
                    app_id: self.app_id.clone(),
                    execution_id: execution_id.clone(),
                    container_id: container_id.clone(),
                })
                .await;
            self.ctx.hub.attach_container(
                &self.app_id,
                container_id,
                Arc::clone(&self.ctx.engine),
            );
        }

        let pid = match &container_id {
            Some(id) => self.ctx.engine.inspect(id).await.ok().and_then(|s| s.pid),
            None => None,
        };

        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    current_state: Some(LifecycleState::Running),
                    last_start: Some(Utc::now()),
                    exit_code: Some(None),
                    pid: Some(pid),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        let _ = self
            .ctx
            .event_tx
            .send(Event::ContainerStarted {
                app_id: self.app_id.clone(),
                execution_id: execution_id.clone(),
            })
            .await;

        if let Some(container_id) = container_id {
            self.spawn_exit_watcher(execution_id.clone(), container_id);
        }
        Ok(())
    }

    /// Verbatim CLI path for `container`-type applications.
    async fn launch_cli(&self, app: &Application) -> Result<Option<String>, RuntimeError> {
        let tokens = app
            .docker_command()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                RuntimeError::Validation(format!("{} has no dockerCommand", self.app_id))
            })?;
        let output = self.ctx.engine.run_cli(&tokens).await.map_err(RuntimeError::from)?;
        if !output.stdout.is_empty() {
            self.ctx.hub.publish_system(&self.app_id, &output.stdout);
        }
        if !output.stderr.is_empty() {
            self.ctx.hub.publish_system(&self.app_id, &output.stderr);
        }
        Ok(output.container_id)
    }

    /// Spec path for python/binary applications.
    async fn launch_spec(
        &self,
        app: &Application,
        execution_id: &ExecutionId,
        vehicle_id: Option<&str>,
    ) -> Result<Option<String>, RuntimeError> {
        self.materialize(app)?;
        let dep_mount =
            deps::materialize(&self.ctx.engine, &self.ctx.store, &self.ctx.paths, app).await?;

        let mut spec = self.build_spec(app, execution_id, dep_mount)?;
        if let Some(vehicle_id) = vehicle_id {
            self.inject_credentials(&mut spec, vehicle_id).await;
        }

        let container_id =
            self.ctx.engine.create(&spec).await.map_err(RuntimeError::from)?;
        self.ctx.engine.start(&container_id).await.map_err(RuntimeError::from)?;
        Ok(Some(container_id))
    }

    /// Create the working directory and write python source.
    fn materialize(&self, app: &Application) -> Result<(), RuntimeError> {
        let app_dir = self.ctx.paths.app_dir(&self.app_id);
        std::fs::create_dir_all(&app_dir)
            .map_err(|e| RuntimeError::Transient(format!("app dir: {e}")))?;

        if app.app_type == AppType::Python {
            let entry = app.entry_point.as_deref().ok_or_else(|| {
                RuntimeError::Validation(format!("{} has no entry_point", self.app_id))
            })?;
            let code = app.code.as_deref().ok_or_else(|| {
                RuntimeError::Validation(format!("{} has no code", self.app_id))
            })?;
            std::fs::write(app_dir.join(entry), code)
                .map_err(|e| RuntimeError::Transient(format!("write source: {e}")))?;
        }
        Ok(())
    }

    fn build_spec(
        &self,
        app: &Application,
        execution_id: &ExecutionId,
        dep_mount: Option<std::path::PathBuf>,
    ) -> Result<ContainerSpec, RuntimeError> {
        let app_dir = self.ctx.paths.app_dir(&self.app_id);
        let mut spec = ContainerSpec {
            name: Some(container_name(&self.app_id, execution_id)),
            env: app.env.clone(),
            working_dir: Some(app.working_dir.clone().unwrap_or_else(|| "/app".to_string())),
            memory_limit_bytes: app.resources.memory_limit_bytes,
            cpu_quota_us: app.resources.cpu_limit_us,
            network: Some(network_mode(app)),
            read_only_root: config_bool(app, "readOnlyRoot"),
            ..Default::default()
        };
        if spec.read_only_root {
            spec.tmpfs.insert("/tmp".to_string(), "rw,size=64m".to_string());
        }

        spec.binds.push(Bind {
            host: app_dir,
            container: "/app".to_string(),
            read_only: false,
        });
        if let Some(dep_dir) = dep_mount {
            spec.binds.push(Bind {
                host: dep_dir,
                container: "/deps".to_string(),
                read_only: true,
            });
            spec.env.insert("PYTHONPATH".to_string(), "/deps".to_string());
        }

        match app.app_type {
            AppType::Python => {
                let entry = app.entry_point.as_deref().ok_or_else(|| {
                    RuntimeError::Validation(format!("{} has no entry_point", self.app_id))
                })?;
                spec.image = config_str(app, "image")
                    .unwrap_or_else(|| "python:3.11-slim".to_string());
                spec.command = ["python".to_string(), "-u".to_string(), format!("/app/{entry}")]
                    .into_iter()
                    .chain(app.args.iter().cloned())
                    .collect();
            }
            AppType::Binary => {
                let binary = app.binary_path.as_deref().ok_or_else(|| {
                    RuntimeError::Validation(format!("{} has no binary_path", self.app_id))
                })?;
                let file_name = std::path::Path::new(binary)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("app");
                let target = format!("/app/bin/{file_name}");
                spec.binds.push(Bind {
                    host: binary.into(),
                    container: target.clone(),
                    read_only: true,
                });
                spec.image = config_str(app, "image")
                    .unwrap_or_else(|| "debian:bookworm-slim".to_string());
                spec.command =
                    std::iter::once(target).chain(app.args.iter().cloned()).collect();
            }
            AppType::Container => {
                return Err(RuntimeError::Validation(
                    "container type uses the CLI path".to_string(),
                ))
            }
        }

        Ok(spec.labeled_for(&self.app_id))
    }

    /// Append vehicle credential environment entries. Missing credentials
    /// log a warning instead of failing the start.
    async fn inject_credentials(&self, spec: &mut ContainerSpec, vehicle_id: &str) {
        match self.ctx.vault.get_access_token(vehicle_id, &[]).await {
            Ok(token) => {
                spec.env.insert("VEHICLE_ACCESS_TOKEN".to_string(), token);
                spec.env.insert("VEHICLE_ID".to_string(), vehicle_id.to_string());
                spec.env
                    .insert("KUKSA_SERVER_URL".to_string(), self.ctx.broker_url.clone());
                spec.env
                    .insert("APPLICATION_ID".to_string(), self.app_id.to_string());
                spec.env.insert(
                    "CREDENTIAL_INJECTED_AT".to_string(),
                    Utc::now().to_rfc3339(),
                );
            }
            Err(VaultError::NoCredentials(_)) => {
                tracing::warn!(
                    app_id = %self.app_id,
                    vehicle_id,
                    "no credentials in vault, starting without injection"
                );
            }
            Err(e) => {
                tracing::warn!(
                    app_id = %self.app_id,
                    vehicle_id,
                    error = %e,
                    "credential lookup failed, starting without injection"
                );
            }
        }
    }

    fn spawn_exit_watcher(&self, execution_id: ExecutionId, container_id: String) {
        let engine = Arc::clone(&self.ctx.engine);
        let event_tx = self.ctx.event_tx.clone();
        let app_id = self.app_id.clone();
        tokio::spawn(async move {
            let exit_code = match engine.wait(&container_id).await {
                Ok(info) => info.exit_code,
                Err(e) => {
                    tracing::warn!(%app_id, error = %e, "container wait failed");
                    None
                }
            };
            let _ = event_tx
                .send(Event::ContainerExited { app_id, execution_id, exit_code })
                .await;
        });
    }

    /// Graceful stop. The intent (`Stopping`) is committed before the engine
    /// call; the exit watcher completes the transition.
    pub async fn stop(&mut self) -> Result<LifecycleState, RuntimeError> {
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;
        match state.current_state {
            LifecycleState::Stopped
            | LifecycleState::Installed
            | LifecycleState::Error => Ok(state.current_state),
            LifecycleState::Stopping => Ok(LifecycleState::Stopping),
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::Paused => {
                self.ctx
                    .store
                    .upsert_runtime_state(
                        &self.app_id,
                        &RuntimeStatePatch {
                            current_state: Some(LifecycleState::Stopping),
                            ..Default::default()
                        },
                    )
                    .map_err(RuntimeError::from)?;
                let _ = self.ctx.store.record_deploy(
                    &self.app_id,
                    state.execution_id.as_ref(),
                    "stop",
                    None,
                    Utc::now(),
                );

                if let Some(container_id) = &state.container_id {
                    match self.ctx.engine.stop(container_id, STOP_GRACE).await {
                        Ok(()) => {}
                        Err(crate::docker::EngineError::NotFound(_)) => {
                            // Already gone: settle immediately.
                            self.settle_exit(None, state.last_start)?;
                            return Ok(LifecycleState::Stopped);
                        }
                        Err(e) => return Err(RuntimeError::from(e)),
                    }
                } else {
                    self.settle_exit(None, state.last_start)?;
                    return Ok(LifecycleState::Stopped);
                }
                Ok(LifecycleState::Stopping)
            }
        }
    }

    pub async fn pause(&mut self) -> Result<LifecycleState, RuntimeError> {
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;
        if state.current_state != LifecycleState::Running {
            return Err(RuntimeError::Validation(format!(
                "cannot pause {} from state {}",
                self.app_id, state.current_state
            )));
        }
        let container_id = state.container_id.as_deref().ok_or_else(|| {
            RuntimeError::Engine(format!("{} has no container", self.app_id))
        })?;
        self.ctx.engine.pause(container_id).await.map_err(RuntimeError::from)?;
        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    current_state: Some(LifecycleState::Paused),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        Ok(LifecycleState::Paused)
    }

    pub async fn resume(&mut self) -> Result<LifecycleState, RuntimeError> {
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;
        if state.current_state != LifecycleState::Paused {
            return Err(RuntimeError::Validation(format!(
                "cannot resume {} from state {}",
                self.app_id, state.current_state
            )));
        }
        let container_id = state.container_id.as_deref().ok_or_else(|| {
            RuntimeError::Engine(format!("{} has no container", self.app_id))
        })?;
        self.ctx.engine.unpause(container_id).await.map_err(RuntimeError::from)?;
        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    current_state: Some(LifecycleState::Running),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        Ok(LifecycleState::Running)
    }

    /// Tear everything down: container, storage, records.
    pub async fn remove(&mut self) -> Result<(), RuntimeError> {
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;
        self.current_exec = None;

        if let Some(container_id) = &state.container_id {
            if state.current_state.is_active() || state.current_state == LifecycleState::Paused {
                let _ = self.ctx.engine.stop(container_id, STOP_GRACE).await;
            }
            match self.ctx.engine.remove(container_id, true).await {
                Ok(()) | Err(crate::docker::EngineError::NotFound(_)) => {}
                Err(e) => tracing::warn!(app_id = %self.app_id, error = %e, "container remove failed"),
            }
        }

        self.ctx.hub.forget_app(&self.app_id);
        let _ = std::fs::remove_dir_all(self.ctx.paths.app_dir(&self.app_id));
        let _ = std::fs::remove_dir_all(self.ctx.paths.deps_dir(&self.app_id));

        self.ctx.store.delete_application(&self.app_id).map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Handle a container exit event. Stale events (an older execution) are
    /// ignored.
    pub fn handle_exit(
        &mut self,
        execution_id: &ExecutionId,
        exit_code: Option<i64>,
    ) -> Result<ExitOutcome, RuntimeError> {
        if self.current_exec.as_ref() != Some(execution_id) {
            tracing::debug!(app_id = %self.app_id, "ignoring exit of stale execution");
            return Ok(ExitOutcome::Settled(LifecycleState::Stopped));
        }
        self.current_exec = None;
        self.ctx.hub.detach_container(&self.app_id);

        let app = self.ctx.store.get_application(&self.app_id).map_err(RuntimeError::from)?;
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;

        let stopping = state.current_state == LifecycleState::Stopping;
        let clean = exit_code == Some(0);

        let (next, restart) = if stopping || clean || app.restart_policy == RestartPolicy::Never
        {
            (LifecycleState::Stopped, false)
        } else {
            match app.restart_policy {
                RestartPolicy::OnFailure => (LifecycleState::Installed, true),
                RestartPolicy::Always => (LifecycleState::Starting, true),
                RestartPolicy::Never => (LifecycleState::Stopped, false),
            }
        };

        self.settle_exit_to(next, exit_code, state.last_start)?;
        self.ctx.hub.publish_system(
            &self.app_id,
            &match exit_code {
                Some(code) => format!("container exited with code {code}"),
                None => "container exited (unknown code)".to_string(),
            },
        );

        if clean || stopping {
            self.restarts.reset();
        }
        if !restart {
            return Ok(ExitOutcome::Settled(next));
        }

        match self.restarts.next_delay(Instant::now()) {
            Some(delay) => Ok(ExitOutcome::Restart(delay)),
            None => {
                let message = format!(
                    "restart budget exhausted ({RESTART_MAX_ATTEMPTS} attempts in 10 minutes)"
                );
                self.fail_current(&message)?;
                Ok(ExitOutcome::Settled(LifecycleState::Error))
            }
        }
    }

    fn settle_exit(
        &self,
        exit_code: Option<i64>,
        last_start: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), RuntimeError> {
        self.settle_exit_to(LifecycleState::Stopped, exit_code, last_start)
    }

    /// Settle a pending stop synchronously so a restart can begin without
    /// waiting for the exit event; the event is then ignored as stale.
    pub(crate) fn force_settle_for_restart(&mut self) -> Result<(), RuntimeError> {
        let state =
            self.ctx.store.get_runtime_state(&self.app_id).map_err(RuntimeError::from)?;
        if state.current_state == LifecycleState::Stopping {
            self.settle_exit(None, state.last_start)?;
        }
        self.current_exec = None;
        self.ctx.hub.detach_container(&self.app_id);
        Ok(())
    }

    fn settle_exit_to(
        &self,
        next: LifecycleState,
        exit_code: Option<i64>,
        last_start: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), RuntimeError> {
        let now = Utc::now();
        let ran_secs = last_start
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    current_state: Some(next),
                    last_exit: Some(now),
                    exit_code: Some(exit_code),
                    add_runtime_secs: Some(ran_secs),
                    pid: Some(None),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Move to `Error` after a failed start, keeping the container (if any)
    /// for diagnostics.
    fn fail(&mut self, execution_id: &ExecutionId, message: &str) {
        self.current_exec = None;
        self.ctx.hub.publish_system(&self.app_id, &format!("start failed: {message}"));
        if let Err(e) = self.ctx.store.upsert_runtime_state(
            &self.app_id,
            &RuntimeStatePatch {
                current_state: Some(LifecycleState::Error),
                ..Default::default()
            },
        ) {
            tracing::error!(app_id = %self.app_id, error = %e, "could not persist error state");
        }
        let _ = self.ctx.store.record_deploy(
            &self.app_id,
            Some(execution_id),
            "error",
            Some(message),
            Utc::now(),
        );
    }

    fn fail_current(&self, message: &str) -> Result<(), RuntimeError> {
        self.ctx.hub.publish_system(&self.app_id, message);
        self.ctx
            .store
            .upsert_runtime_state(
                &self.app_id,
                &RuntimeStatePatch {
                    current_state: Some(LifecycleState::Error),
                    ..Default::default()
                },
            )
            .map_err(RuntimeError::from)?;
        Ok(())
    }
}

fn container_name(app_id: &AppId, execution_id: &ExecutionId) -> String {
    let suffix: String = execution_id
        .as_str()
        .trim_start_matches(ExecutionId::PREFIX)
        .chars()
        .take(6)
        .collect();
    format!("sdv-{app_id}-{suffix}")
}

fn network_mode(app: &Application) -> NetworkMode {
    match config_str(app, "networkMode").as_deref() {
        Some("host") => NetworkMode::Host,
        Some(name) if !name.is_empty() => NetworkMode::Bridge(name.to_string()),
        _ => NetworkMode::default(),
    }
}

fn config_str(app: &Application, key: &str) -> Option<String> {
    app.config.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn config_bool(app: &Application, key: &str) -> bool {
    app.config.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
pub(crate) mod tests;
