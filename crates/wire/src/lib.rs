// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message protocol for the local channel and the hub bridge.
//!
//! Wire format: one JSON object per WebSocket text frame, shaped
//! `{ "type": <string>, "id": <string>, ... }`. Responses echo the request
//! id and use the `<type>-response` tag; pushes (`app_output`,
//! `signals_updated`) carry no id.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod envelope;
mod hub;
mod request;
mod response;

pub use envelope::{decode_request, encode_reply, ProtocolError};
pub use hub::{parse_hub_frame, wrap_kit_reply, HubInbound, RegisterKit, KIT_REPLY_TYPE};
pub use request::{ClientRequest, ManageAction, Prototype, SidecarAction};
pub use response::{AppSummary, DeployOutcome, ServerMessage};

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
