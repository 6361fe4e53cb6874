// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn stop_app_uses_camel_app_id() {
    let json = serde_json::to_value(ClientRequest::StopApp { app_id: "a".to_string() }).unwrap();
    assert_eq!(json["type"], "stop_app");
    assert_eq!(json["appId"], "a");
}

#[test]
fn log_unsubscribe_app_id_is_optional() {
    let request: ClientRequest =
        serde_json::from_str(r#"{"type":"app_log_unsubscribe"}"#).unwrap();
    assert_eq!(request, ClientRequest::AppLogUnsubscribe { app_id: None });
}

#[test]
fn signal_set_keeps_value_types() {
    let request: ClientRequest = serde_json::from_str(
        r#"{"type":"vehicle_signal_set","updates":{"Vehicle.Speed":72.5,"Vehicle.Cabin.Light":true}}"#,
    )
    .unwrap();
    let ClientRequest::VehicleSignalSet { updates } = request else {
        panic!("wrong variant");
    };
    assert_eq!(updates["Vehicle.Speed"], serde_json::json!(72.5));
    assert_eq!(updates["Vehicle.Cabin.Light"], serde_json::json!(true));
}

#[test]
fn kuksa_deployment_actions() {
    for (text, action) in [
        ("start", SidecarAction::Start),
        ("stop", SidecarAction::Stop),
        ("restart", SidecarAction::Restart),
    ] {
        let frame = format!(r#"{{"type":"kuksa_server_deployment","action":"{text}"}}"#);
        let request: ClientRequest = serde_json::from_str(&frame).unwrap();
        assert_eq!(request, ClientRequest::KuksaServerDeployment { action });
    }
}

#[test]
fn prototype_defaults_are_empty() {
    let prototype: Prototype =
        serde_json::from_str(r#"{"id":"x","type":"binary","binaryPath":"/bin/true"}"#).unwrap();
    assert!(prototype.args.is_empty());
    assert!(prototype.env.is_empty());
    assert!(prototype.python_deps.is_empty());
    assert!(!prototype.auto_start);
    assert_eq!(prototype.binary_path.as_deref(), Some("/bin/true"));
}
