// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub bridge frames.
//!
//! The hub multiplexes remote clients onto one WebSocket. Inbound frames
//! wrap a client message with an opaque `request_from` token; every reply
//! produced for that message is wrapped back with the token echoed verbatim.
//! The bridge never looks inside the inner message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire tag for outbound reply wrappers.
pub const KIT_REPLY_TYPE: &str = "messageToKit-kitReply";

/// Sent on every (re)connect to declare this runtime to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterKit {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub kit_id: String,
    pub capabilities: Vec<String>,
}

impl RegisterKit {
    pub fn new(kit_id: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            frame_type: "register_kit".to_string(),
            kit_id: kit_id.into(),
            capabilities,
        }
    }
}

/// Frames the hub sends to this runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum HubInbound {
    /// A remote client message to dispatch, with its routing token.
    MessageToKit {
        request_from: String,
        message: Value,
    },
    /// Anything else (acks, broadcasts we do not implement). Ignored.
    Other { frame_type: String },
}

/// Parse one inbound hub frame.
///
/// Returns None for non-JSON or non-object frames; the connection is kept.
pub fn parse_hub_frame(text: &str) -> Option<HubInbound> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;
    let frame_type = obj.get("type").and_then(Value::as_str)?;

    if frame_type == "messageToKit" {
        let request_from = obj.get("request_from").and_then(Value::as_str)?.to_string();
        let message = obj.get("message")?.clone();
        return Some(HubInbound::MessageToKit { request_from, message });
    }
    Some(HubInbound::Other { frame_type: frame_type.to_string() })
}

/// Wrap an already-encoded reply frame for routing back through the hub.
///
/// The inner frame's fields are flattened into the wrapper; `type` becomes
/// [`KIT_REPLY_TYPE`] and `request_from` is echoed verbatim.
pub fn wrap_kit_reply(request_from: &str, inner_frame: &str) -> String {
    let mut value: Value = match serde_json::from_str(inner_frame) {
        Ok(v) => v,
        Err(_) => serde_json::json!({ "error": "unencodable reply" }),
    };
    if let Some(obj) = value.as_object_mut() {
        if let Some(inner_type) = obj.remove("type") {
            obj.insert("inner_type".to_string(), inner_type);
        }
        obj.insert("type".to_string(), Value::String(KIT_REPLY_TYPE.to_string()));
        obj.insert("request_from".to_string(), Value::String(request_from.to_string()));
    }
    value.to_string()
}
