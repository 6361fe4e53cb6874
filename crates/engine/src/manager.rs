// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application registry and per-app serialization gate.
//!
//! One supervisor per application, each behind its own fair async mutex;
//! every lifecycle operation locks the app's mutex for its whole duration,
//! so transitions are linearized per app while distinct apps proceed in
//! parallel. Reads (`list`, `status`) bypass the gates and see committed
//! store state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use sdv_core::{
    AppId, Application, ApplicationPatch, ExecutionId, LifecycleState, RuntimeError,
    RuntimeState, RuntimeStatePatch,
};
use sdv_storage::{AppFilter, DeployRecord};

use crate::docker::{LABEL_RUNTIME, LABEL_RUNTIME_VALUE};
use crate::supervisor::{ExitOutcome, Supervisor, SupervisorCtx};

/// Outcome of a deploy operation.
#[derive(Debug, Clone)]
pub struct DeployResult {
    pub app_id: AppId,
    pub execution_id: Option<ExecutionId>,
    pub state: LifecycleState,
    pub message: String,
}

struct ManagerInner {
    ctx: SupervisorCtx,
    supervisors: Mutex<HashMap<AppId, Arc<tokio::sync::Mutex<Supervisor>>>>,
}

/// The registry. Cheap to clone.
#[derive(Clone)]
pub struct AppManager {
    inner: Arc<ManagerInner>,
}

impl AppManager {
    pub fn new(ctx: SupervisorCtx) -> Self {
        Self {
            inner: Arc::new(ManagerInner { ctx, supervisors: Mutex::new(HashMap::new()) }),
        }
    }

    pub fn ctx(&self) -> &SupervisorCtx {
        &self.inner.ctx
    }

    /// The app's gate + supervisor cell, created on first touch.
    fn cell(&self, app_id: &AppId) -> Arc<tokio::sync::Mutex<Supervisor>> {
        let mut supervisors = self.inner.supervisors.lock();
        supervisors
            .entry(app_id.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Supervisor::new(
                    app_id.clone(),
                    self.inner.ctx.clone(),
                )))
            })
            .clone()
    }

    fn drop_cell(&self, app_id: &AppId) {
        self.inner.supervisors.lock().remove(app_id);
    }

    /// Register (or update) an application and start it.
    ///
    /// A fresh id installs and starts. An existing id is patched; if it is
    /// already running it is left running, otherwise it starts again only
    /// when `auto_start` is set.
    pub async fn deploy(
        &self,
        draft: Application,
        vehicle_id: Option<&str>,
    ) -> Result<DeployResult, RuntimeError> {
        let app_id = draft.id.clone();
        let cell = self.cell(&app_id);
        let mut supervisor = cell.lock().await;

        let store = &self.inner.ctx.store;
        match store.get_application(&app_id) {
            Err(sdv_storage::StoreError::NotFound(_)) => {
                draft.validate().map_err(RuntimeError::Validation)?;
                store.insert_application(&draft).map_err(RuntimeError::from)?;
                let _ = store.record_deploy(&app_id, None, "deploy", None, Utc::now());

                let execution_id = supervisor.start(vehicle_id).await?;
                Ok(DeployResult {
                    app_id,
                    execution_id: Some(execution_id),
                    state: LifecycleState::Running,
                    message: "deployed and started".to_string(),
                })
            }
            Ok(_existing) => {
                let patch = patch_from_draft(&draft);
                let updated = store
                    .update_application(&app_id, &patch, Utc::now())
                    .map_err(RuntimeError::from)?;
                let _ = store.record_deploy(&app_id, None, "redeploy", None, Utc::now());

                let state = store.get_runtime_state(&app_id).map_err(RuntimeError::from)?;
                if state.current_state.is_active() {
                    return Ok(DeployResult {
                        app_id,
                        execution_id: state.execution_id,
                        state: state.current_state,
                        message: "already running, record updated".to_string(),
                    });
                }
                if updated.auto_start {
                    let execution_id = supervisor.start(vehicle_id).await?;
                    return Ok(DeployResult {
                        app_id,
                        execution_id: Some(execution_id),
                        state: LifecycleState::Running,
                        message: "updated and restarted".to_string(),
                    });
                }
                Ok(DeployResult {
                    app_id,
                    execution_id: state.execution_id,
                    state: state.current_state,
                    message: "record updated".to_string(),
                })
            }
            Err(e) => Err(RuntimeError::from(e)),
        }
    }

    pub async fn start(
        &self,
        app_id: &AppId,
        vehicle_id: Option<&str>,
    ) -> Result<ExecutionId, RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        let mut supervisor = cell.lock().await;
        supervisor.start(vehicle_id).await
    }

    pub async fn stop(&self, app_id: &AppId) -> Result<LifecycleState, RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        let mut supervisor = cell.lock().await;
        supervisor.stop().await
    }

    pub async fn restart(&self, app_id: &AppId) -> Result<ExecutionId, RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        let mut supervisor = cell.lock().await;
        supervisor.stop().await?;
        supervisor.force_settle_for_restart()?;
        supervisor.start(None).await
    }

    pub async fn pause(&self, app_id: &AppId) -> Result<LifecycleState, RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        let mut supervisor = cell.lock().await;
        supervisor.pause().await
    }

    pub async fn resume(&self, app_id: &AppId) -> Result<LifecycleState, RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        let mut supervisor = cell.lock().await;
        supervisor.resume().await
    }

    pub async fn remove(&self, app_id: &AppId) -> Result<(), RuntimeError> {
        self.ensure_known(app_id)?;
        let cell = self.cell(app_id);
        {
            let mut supervisor = cell.lock().await;
            supervisor.remove().await?;
        }
        self.drop_cell(app_id);
        Ok(())
    }

    /// Lock-free registry read.
    pub fn list(&self) -> Result<Vec<(Application, RuntimeState)>, RuntimeError> {
        let store = &self.inner.ctx.store;
        let apps = store.list_applications(&AppFilter::default()).map_err(RuntimeError::from)?;
        let mut entries = Vec::with_capacity(apps.len());
        for app in apps {
            let state = store.get_runtime_state(&app.id).map_err(RuntimeError::from)?;
            entries.push((app, state));
        }
        Ok(entries)
    }

    /// Lock-free status read.
    pub fn status(
        &self,
        app_id: &AppId,
    ) -> Result<(RuntimeState, Vec<DeployRecord>), RuntimeError> {
        let store = &self.inner.ctx.store;
        let state = store.get_runtime_state(app_id).map_err(RuntimeError::from)?;
        let history = store.list_deploy_history(app_id, 10).map_err(RuntimeError::from)?;
        Ok((state, history))
    }

    /// Route a container exit into the owning supervisor. Restarts are
    /// scheduled here with the supervisor's backoff delay.
    pub async fn handle_container_exit(
        &self,
        app_id: &AppId,
        execution_id: &ExecutionId,
        exit_code: Option<i64>,
    ) {
        let cell = self.cell(app_id);
        let outcome = {
            let mut supervisor = cell.lock().await;
            match supervisor.handle_exit(execution_id, exit_code) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(%app_id, error = %e, "exit handling failed");
                    return;
                }
            }
        };

        if let ExitOutcome::Restart(delay) = outcome {
            tracing::info!(%app_id, ?delay, "scheduling restart");
            let manager = self.clone();
            let app_id = app_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let cell = manager.cell(&app_id);
                let mut supervisor = cell.lock().await;
                if let Err(e) = supervisor.start(None).await {
                    tracing::warn!(%app_id, error = %e, "scheduled restart failed");
                }
            });
        }
    }

    /// Boot-time reconciliation: adopt containers that match a running
    /// application, prune the rest, then settle store states that lost
    /// their container.
    pub async fn reconcile_orphans(&self) {
        let engine = &self.inner.ctx.engine;
        let store = &self.inner.ctx.store;

        let containers = match engine.list_by_label(LABEL_RUNTIME, LABEL_RUNTIME_VALUE).await {
            Ok(containers) => containers,
            Err(e) => {
                tracing::warn!(error = %e, "orphan scan failed, engine unavailable");
                Vec::new()
            }
        };

        let mut adopted: Vec<AppId> = Vec::new();
        for container in containers {
            let app_id = container.app_id().and_then(|id| AppId::parse(id).ok());
            let claim = app_id.as_ref().and_then(|id| {
                store
                    .get_runtime_state(id)
                    .ok()
                    .filter(|s| s.current_state.is_active() && container.running)
                    .map(|s| (id.clone(), s))
            });

            match claim {
                Some((app_id, state)) => {
                    tracing::info!(%app_id, container = %container.id, "reattaching to live container");
                    let execution_id =
                        state.execution_id.clone().unwrap_or_default();
                    let _ = store.upsert_runtime_state(
                        &app_id,
                        &RuntimeStatePatch {
                            container_id: Some(Some(container.id.clone())),
                            execution_id: Some(Some(execution_id.clone())),
                            current_state: Some(LifecycleState::Running),
                            ..Default::default()
                        },
                    );
                    let cell = self.cell(&app_id);
                    let mut supervisor = cell.lock().await;
                    supervisor.adopt(execution_id, &container.id);
                    adopted.push(app_id);
                }
                None => {
                    tracing::info!(container = %container.id, "removing orphaned container");
                    if container.running {
                        let _ = engine.stop(&container.id, crate::supervisor::STOP_GRACE).await;
                    }
                    let _ = engine.remove(&container.id, true).await;
                }
            }
        }

        // Applications the store believes are active but whose container is
        // gone settle to stopped before auto-start considers them.
        if let Ok(states) = store.list_runtime_states() {
            for state in states {
                if !state.current_state.is_active() || adopted.contains(&state.app_id) {
                    continue;
                }
                tracing::info!(app_id = %state.app_id, "container lost while runtime was down");
                let _ = store.upsert_runtime_state(
                    &state.app_id,
                    &RuntimeStatePatch {
                        current_state: Some(LifecycleState::Stopped),
                        container_id: Some(None),
                        pid: Some(None),
                        ..Default::default()
                    },
                );
                self.inner
                    .ctx
                    .hub
                    .publish_system(&state.app_id, "container lost while runtime was down");
            }
        }
    }

    /// Boot-time auto-start pass. Runs after reconciliation.
    pub async fn autostart(&self) {
        let store = &self.inner.ctx.store;
        let apps = match store.list_applications(&AppFilter::default()) {
            Ok(apps) => apps,
            Err(e) => {
                tracing::error!(error = %e, "autostart scan failed");
                return;
            }
        };

        for app in apps.into_iter().filter(|a| a.auto_start) {
            let state = match store.get_runtime_state(&app.id) {
                Ok(state) => state,
                Err(_) => continue,
            };
            if state.current_state.is_active() {
                continue; // adopted during reconciliation
            }
            tracing::info!(app_id = %app.id, "auto-starting");
            if let Err(e) = self.start(&app.id, None).await {
                tracing::warn!(app_id = %app.id, error = %e, "auto-start failed");
            }
        }
    }

    /// Stop every active application; used during shutdown.
    pub async fn stop_all(&self) {
        let entries = match self.list() {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for (app, state) in entries {
            if state.current_state.is_active() || state.current_state == LifecycleState::Paused {
                if let Err(e) = self.stop(&app.id).await {
                    tracing::warn!(app_id = %app.id, error = %e, "shutdown stop failed");
                }
            }
        }
    }

    fn ensure_known(&self, app_id: &AppId) -> Result<(), RuntimeError> {
        self.inner
            .ctx
            .store
            .get_application(app_id)
            .map(|_| ())
            .map_err(RuntimeError::from)
    }
}

fn patch_from_draft(draft: &Application) -> ApplicationPatch {
    ApplicationPatch {
        name: Some(draft.name.clone()),
        description: draft.description.clone(),
        version: draft.version.clone(),
        code: draft.code.clone(),
        entry_point: draft.entry_point.clone(),
        binary_path: draft.binary_path.clone(),
        working_dir: draft.working_dir.clone(),
        args: Some(draft.args.clone()),
        env: Some(draft.env.clone()),
        python_deps: Some(draft.python_deps.clone()),
        vehicle_signals: Some(draft.vehicle_signals.clone()),
        config: Some(draft.config.clone()),
        auto_start: Some(draft.auto_start),
        restart_policy: Some(draft.restart_policy),
        resources: Some(draft.resources),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
