// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatch::tests::harness;
use sdv_wire::ServerMessage;

#[tokio::test]
async fn mock_status_before_registration_is_stopped() {
    let h = harness();
    let sidecars = Sidecars::new(h.manager.clone());

    let ServerMessage::MockServiceStatus { running, state, .. } = sidecars.mock_status().await
    else {
        panic!("wrong reply");
    };
    assert!(!running);
    assert_eq!(state, LifecycleState::Stopped);
}

#[tokio::test]
async fn mock_start_registers_and_runs_as_container_app() {
    let h = harness();
    let sidecars = Sidecars::new(h.manager.clone());

    let ServerMessage::MockServiceStarted { state } = sidecars.mock_start().await else {
        panic!("wrong reply");
    };
    assert_eq!(state, LifecycleState::Running);

    // Registered through the ordinary application paths
    let app_id = AppId::parse(MOCK_APP_ID).unwrap();
    let app = h.manager.ctx().store.get_application(&app_id).unwrap();
    assert_eq!(app.app_type, AppType::Container);
    assert!(app.docker_command().unwrap().contains(&"run".to_string()));

    let calls = h.engine.cli_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&"sdv-mock-service".to_string()));

    let ServerMessage::MockServiceStatus { running, .. } = sidecars.mock_status().await else {
        panic!("wrong reply");
    };
    assert!(running);
}

#[tokio::test]
async fn mock_stop_settles_the_sidecar() {
    let h = harness();
    let sidecars = Sidecars::new(h.manager.clone());
    sidecars.mock_start().await;

    let ServerMessage::MockServiceStopped { state } = sidecars.mock_stop().await else {
        panic!("wrong reply");
    };
    assert!(matches!(state, LifecycleState::Stopping | LifecycleState::Stopped));
}

#[tokio::test]
async fn mock_configure_without_running_instance_does_not_restart() {
    let h = harness();
    let sidecars = Sidecars::new(h.manager.clone());

    let mut config = serde_json::Map::new();
    config.insert("interval".to_string(), serde_json::json!(5));
    let ServerMessage::MockServiceConfigured { restarted } =
        sidecars.mock_configure(config).await
    else {
        panic!("wrong reply");
    };
    assert!(!restarted);

    let ServerMessage::MockServiceStatus { config, .. } = sidecars.mock_status().await else {
        panic!("wrong reply");
    };
    assert_eq!(config.unwrap()["interval"], 5);
}

#[tokio::test]
async fn kuksa_lifecycle_actions() {
    let h = harness();
    let sidecars = Sidecars::new(h.manager.clone());

    let ServerMessage::KuksaServer { action, state } =
        sidecars.kuksa(sdv_wire::SidecarAction::Start).await
    else {
        panic!("wrong reply");
    };
    assert_eq!(action, "start");
    assert_eq!(state, LifecycleState::Running);

    let app_id = AppId::parse(KUKSA_APP_ID).unwrap();
    let app = h.manager.ctx().store.get_application(&app_id).unwrap();
    assert_eq!(app.app_type, AppType::Container);

    let ServerMessage::KuksaServer { action, .. } =
        sidecars.kuksa(sdv_wire::SidecarAction::Stop).await
    else {
        panic!("wrong reply");
    };
    assert_eq!(action, "stop");
}
