// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame decode/encode with correlation-id handling.

use serde_json::Value;
use thiserror::Error;

use crate::{ClientRequest, ServerMessage};

/// Errors from frame handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not JSON, or not an object. The connection stays open; the frame is
    /// dropped without a reply because there is no id to correlate.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Valid JSON object with an unrecognized or missing `type`.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Known `type` but the payload fields do not validate.
    #[error("invalid payload for {0}: {1}")]
    InvalidPayload(String, String),
}

/// Decode one text frame into its correlation id and request.
///
/// The id is optional on the wire; requests without one still execute but
/// their replies cannot be correlated by the client.
pub fn decode_request(text: &str) -> Result<(Option<String>, ClientRequest), ProtocolError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::Malformed("frame is not an object".to_string()))?;

    let id = obj.get("id").and_then(Value::as_str).map(str::to_string);
    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::UnknownType("<missing>".to_string()))?
        .to_string();

    match serde_json::from_value::<ClientRequest>(value.clone()) {
        Ok(request) => Ok((id, request)),
        Err(e) => {
            // Distinguish "we don't know this type" from "bad fields" so the
            // caller can reply with a useful error.
            let known = KNOWN_TYPES.contains(&type_name.as_str());
            if known {
                Err(ProtocolError::InvalidPayload(type_name, e.to_string()))
            } else {
                Err(ProtocolError::UnknownType(type_name))
            }
        }
    }
}

/// Serialize a reply, injecting the echoed correlation id.
pub fn encode_reply(id: Option<&str>, message: &ServerMessage) -> String {
    let mut value = match serde_json::to_value(message) {
        Ok(v) => v,
        // ServerMessage contains only serializable fields; this arm exists
        // to satisfy the no-panic policy.
        Err(e) => serde_json::json!({ "type": "error", "error": e.to_string() }),
    };
    if let (Some(id), Some(obj)) = (id, value.as_object_mut()) {
        obj.insert("id".to_string(), Value::String(id.to_string()));
    }
    value.to_string()
}

const KNOWN_TYPES: &[&str] = &[
    "ping",
    "get_runtime_info",
    "deploy_request",
    "list_deployed_apps",
    "manage_app",
    "stop_app",
    "get_app_status",
    "app_log_subscribe",
    "app_log_unsubscribe",
    "vehicle_signal_subscribe",
    "vehicle_signal_unsubscribe",
    "vehicle_signal_get",
    "vehicle_signal_set",
    "mock_service_status",
    "mock_service_start",
    "mock_service_stop",
    "mock_service_configure",
    "kuksa_server_deployment",
];
