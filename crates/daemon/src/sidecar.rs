// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed sidecars: the mock signal provider and the kuksa broker.
//!
//! Both run as ordinary `container`-type applications so the supervisor
//! paths (log capture, state machine, reconciliation) govern them exactly
//! like user workloads. They are registered lazily on first use and never
//! auto-started.

use chrono::Utc;
use parking_lot::Mutex;
use sdv_core::{AppId, AppType, Application, LifecycleState, RestartPolicy, RuntimeError};
use sdv_engine::AppManager;
use sdv_wire::{ServerMessage, SidecarAction};
use std::sync::Arc;

/// Application id of the mock provider sidecar.
pub const MOCK_APP_ID: &str = "mock-service";
/// Application id of the kuksa broker sidecar.
pub const KUKSA_APP_ID: &str = "kuksa-server";

const MOCK_IMAGE: &str = "ghcr.io/eclipse-kuksa/kuksa-mock-provider:main";
const KUKSA_IMAGE: &str = "ghcr.io/eclipse-kuksa/kuksa-databroker:main";

struct SidecarsInner {
    manager: AppManager,
    mock_config: Mutex<serde_json::Map<String, serde_json::Value>>,
}

/// Sidecar controller.
#[derive(Clone)]
pub struct Sidecars {
    inner: Arc<SidecarsInner>,
}

impl Sidecars {
    pub fn new(manager: AppManager) -> Self {
        Self {
            inner: Arc::new(SidecarsInner {
                manager,
                mock_config: Mutex::new(serde_json::Map::new()),
            }),
        }
    }

    pub async fn mock_status(&self) -> ServerMessage {
        let state = self.state_of(MOCK_APP_ID);
        ServerMessage::MockServiceStatus {
            running: state == LifecycleState::Running,
            state,
            config: Some(self.inner.mock_config.lock().clone()),
        }
    }

    pub async fn mock_start(&self) -> ServerMessage {
        match self.start_sidecar(MOCK_APP_ID).await {
            Ok(state) => ServerMessage::MockServiceStarted { state },
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    pub async fn mock_stop(&self) -> ServerMessage {
        match self.stop_sidecar(MOCK_APP_ID).await {
            Ok(state) => ServerMessage::MockServiceStopped { state },
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    /// Store the new configuration; a running mock restarts to pick it up.
    pub async fn mock_configure(
        &self,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> ServerMessage {
        *self.inner.mock_config.lock() = config;
        let restarted = match AppId::parse(MOCK_APP_ID) {
            Ok(app_id) if self.state_of(MOCK_APP_ID) == LifecycleState::Running => {
                match self.inner.manager.restart(&app_id).await {
                    Ok(_) => true,
                    Err(e) => return ServerMessage::from_error(&e),
                }
            }
            _ => false,
        };
        ServerMessage::MockServiceConfigured { restarted }
    }

    pub async fn kuksa(&self, action: SidecarAction) -> ServerMessage {
        let outcome = match action {
            SidecarAction::Start => self.start_sidecar(KUKSA_APP_ID).await,
            SidecarAction::Stop => self.stop_sidecar(KUKSA_APP_ID).await,
            SidecarAction::Restart => {
                match self.ensure_registered(KUKSA_APP_ID).await {
                    Ok(app_id) => self
                        .inner
                        .manager
                        .restart(&app_id)
                        .await
                        .map(|_| LifecycleState::Running),
                    Err(e) => Err(e),
                }
            }
        };
        match outcome {
            Ok(state) => ServerMessage::KuksaServer {
                action: match action {
                    SidecarAction::Start => "start",
                    SidecarAction::Stop => "stop",
                    SidecarAction::Restart => "restart",
                }
                .to_string(),
                state,
            },
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    fn state_of(&self, sidecar: &str) -> LifecycleState {
        AppId::parse(sidecar)
            .ok()
            .and_then(|app_id| self.inner.manager.status(&app_id).ok())
            .map(|(state, _)| state.current_state)
            .unwrap_or(LifecycleState::Stopped)
    }

    async fn start_sidecar(&self, sidecar: &str) -> Result<LifecycleState, RuntimeError> {
        let app_id = self.ensure_registered(sidecar).await?;
        self.inner.manager.start(&app_id, None).await?;
        Ok(LifecycleState::Running)
    }

    async fn stop_sidecar(&self, sidecar: &str) -> Result<LifecycleState, RuntimeError> {
        let app_id = self.ensure_registered(sidecar).await?;
        self.inner.manager.stop(&app_id).await
    }

    /// Insert the sidecar's application record if it does not exist yet.
    async fn ensure_registered(&self, sidecar: &str) -> Result<AppId, RuntimeError> {
        let app_id = AppId::parse(sidecar)
            .map_err(|reason| RuntimeError::Fatal(format!("sidecar id: {reason}")))?;
        let store = &self.inner.manager.ctx().store;
        match store.get_application(&app_id) {
            Ok(_) => Ok(app_id),
            Err(sdv_storage::StoreError::NotFound(_)) => {
                store
                    .insert_application(&sidecar_record(sidecar, &app_id))
                    .map_err(RuntimeError::from)?;
                Ok(app_id)
            }
            Err(e) => Err(RuntimeError::from(e)),
        }
    }
}

fn sidecar_record(sidecar: &str, app_id: &AppId) -> Application {
    let now = Utc::now();
    let (name, image, container_name) = match sidecar {
        KUKSA_APP_ID => ("Kuksa Databroker", KUKSA_IMAGE, "sdv-kuksa-server"),
        _ => ("Mock Signal Provider", MOCK_IMAGE, "sdv-mock-service"),
    };

    let mut config = serde_json::Map::new();
    config.insert(
        "dockerCommand".to_string(),
        serde_json::json!([
            "run",
            "-d",
            "--rm",
            "--name",
            container_name,
            "--network",
            "host",
            image
        ]),
    );

    Application {
        id: app_id.clone(),
        name: name.to_string(),
        description: Some("managed sidecar".to_string()),
        version: None,
        app_type: AppType::Container,
        code: None,
        entry_point: None,
        binary_path: None,
        working_dir: None,
        args: vec![],
        env: Default::default(),
        python_deps: vec![],
        vehicle_signals: vec![],
        data_path: None,
        config,
        status: LifecycleState::Installed,
        auto_start: false,
        restart_policy: RestartPolicy::OnFailure,
        resources: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
#[path = "sidecar_tests.rs"]
mod tests;
