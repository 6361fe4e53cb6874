// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sdv_core::AppType;

#[test]
fn ping_decodes_with_id() {
    let (id, request) = decode_request(r#"{"type":"ping","id":"a"}"#).unwrap();
    assert_eq!(id.as_deref(), Some("a"));
    assert_eq!(request, ClientRequest::Ping);
}

#[test]
fn pong_reply_echoes_id() {
    let encoded = encode_reply(Some("a"), &ServerMessage::Pong);
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["type"], "pong");
    assert_eq!(value["id"], "a");
}

#[test]
fn reply_without_id_omits_field() {
    let encoded = encode_reply(None, &ServerMessage::Pong);
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert!(value.get("id").is_none());
}

#[test]
fn malformed_json_is_malformed_error() {
    assert!(matches!(decode_request("{nope"), Err(ProtocolError::Malformed(_))));
    assert!(matches!(decode_request("42"), Err(ProtocolError::Malformed(_))));
}

#[test]
fn unknown_type_is_reported() {
    let err = decode_request(r#"{"type":"warp_drive","id":"x"}"#).unwrap_err();
    assert_eq!(err, ProtocolError::UnknownType("warp_drive".to_string()));
}

#[test]
fn known_type_with_bad_fields_is_invalid_payload() {
    // manage_app without appId
    let err = decode_request(r#"{"type":"manage_app","id":"x","action":"start"}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidPayload(t, _) if t == "manage_app"));
}

#[test]
fn deploy_request_decodes_prototype() {
    let text = r#"{
        "type": "deploy_request",
        "id": "d1",
        "prototype": {
            "id": "hello",
            "type": "python",
            "name": "Hello",
            "code": "print('hi')",
            "entryPoint": "main.py",
            "autoStart": true
        },
        "vehicleId": "veh-1"
    }"#;
    let (id, request) = decode_request(text).unwrap();
    assert_eq!(id.as_deref(), Some("d1"));
    let ClientRequest::DeployRequest { prototype, vehicle_id, code } = request else {
        panic!("wrong variant");
    };
    assert_eq!(prototype.id, "hello");
    assert_eq!(prototype.app_type, AppType::Python);
    assert_eq!(prototype.entry_point.as_deref(), Some("main.py"));
    assert!(prototype.auto_start);
    assert_eq!(vehicle_id.as_deref(), Some("veh-1"));
    assert!(code.is_none());
}

#[test]
fn deploy_request_accepts_docker_type() {
    let text = r#"{
        "type": "deploy_request",
        "id": "d2",
        "prototype": {
            "id": "nginx",
            "type": "docker",
            "config": { "dockerCommand": ["run", "-d", "nginx:alpine"] }
        }
    }"#;
    let (_, request) = decode_request(text).unwrap();
    let ClientRequest::DeployRequest { prototype, .. } = request else {
        panic!("wrong variant");
    };
    assert_eq!(prototype.app_type, AppType::Container);
    assert!(prototype.config.contains_key("dockerCommand"));
}

#[test]
fn manage_app_action_decodes() {
    let (_, request) =
        decode_request(r#"{"type":"manage_app","id":"m","appId":"hello","action":"restart"}"#)
            .unwrap();
    assert_eq!(
        request,
        ClientRequest::ManageApp {
            app_id: "hello".to_string(),
            action: ManageAction::Restart
        }
    );
}

#[test]
fn app_output_frame_shape() {
    let line = sdv_core::LogLine {
        app_id: sdv_core::AppId::parse("hello").unwrap(),
        seq: 7,
        timestamp: chrono::Utc::now(),
        stream: sdv_core::LogStreamKind::Stdout,
        content: "hi".to_string(),
    };
    let encoded = encode_reply(None, &ServerMessage::from_log_line(&line));
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["type"], "app_output");
    assert_eq!(value["app_id"], "hello");
    assert_eq!(value["output_type"], "stdout");
    assert_eq!(value["content"], "hi");
    assert!(value["timestamp"].is_string());
}

#[test]
fn error_frame_carries_kind() {
    let err = sdv_core::RuntimeError::NotFound("app missing".to_string());
    let encoded = encode_reply(Some("q"), &ServerMessage::from_error(&err));
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["kind"], "not_found");
    assert_eq!(value["id"], "q");
}

#[test]
fn hub_message_to_kit_parses() {
    let text = r#"{
        "type": "messageToKit",
        "request_from": "R1",
        "message": { "type": "ping", "id": "p1" }
    }"#;
    let Some(HubInbound::MessageToKit { request_from, message }) = parse_hub_frame(text) else {
        panic!("expected MessageToKit");
    };
    assert_eq!(request_from, "R1");
    assert_eq!(message["type"], "ping");
}

#[test]
fn hub_other_frames_are_ignored_not_errors() {
    let parsed = parse_hub_frame(r#"{"type":"list-all-kits"}"#);
    assert_eq!(parsed, Some(HubInbound::Other { frame_type: "list-all-kits".to_string() }));
    assert_eq!(parse_hub_frame("not json"), None);
}

#[test]
fn kit_reply_wraps_and_echoes_token() {
    let inner = encode_reply(Some("p1"), &ServerMessage::Pong);
    let wrapped = wrap_kit_reply("R1", &inner);
    let value: serde_json::Value = serde_json::from_str(&wrapped).unwrap();
    assert_eq!(value["type"], KIT_REPLY_TYPE);
    assert_eq!(value["request_from"], "R1");
    assert_eq!(value["inner_type"], "pong");
    assert_eq!(value["id"], "p1");
}

#[test]
fn register_kit_frame_shape() {
    let frame = RegisterKit::new("kit-7", vec!["apps".to_string(), "signals".to_string()]);
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["type"], "register_kit");
    assert_eq!(value["kit_id"], "kit-7");
    assert_eq!(value["capabilities"][0], "apps");
}

#[test]
fn request_type_names_match_wire_tags() {
    let (_, request) = decode_request(r#"{"type":"list_deployed_apps","id":"l"}"#).unwrap();
    assert_eq!(request.type_name(), "list_deployed_apps");
    let (_, request) = decode_request(r#"{"type":"get_runtime_info","id":"r"}"#).unwrap();
    assert_eq!(request.type_name(), "get_runtime_info");
}
