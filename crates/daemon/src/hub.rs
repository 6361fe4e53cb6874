// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub bridge: the persistent outbound connection to the remote hub.
//!
//! The hub multiplexes remote clients onto this one socket. Inbound
//! `messageToKit` frames are unwrapped and dispatched exactly like local
//! requests, with the opaque `request_from` token carried in the request
//! context; every reply or push produced in that context goes back wrapped
//! as `messageToKit-kitReply` with the token echoed verbatim. The bridge
//! never interprets inner payloads.
//!
//! Reconnects re-register the kit; remote subscriptions are considered lost
//! and remote clients must resubscribe. Local subscribers are unaffected.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use sdv_core::ClientId;
use sdv_wire::{parse_hub_frame, wrap_kit_reply, HubInbound, RegisterKit};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{drop_client, Dispatcher, OutboundFrame, RequestContext};

const OUTBOUND_QUEUE: usize = 256;
const INITIAL_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);
const MAX_BACKOFF: std::time::Duration = std::time::Duration::from_secs(30);

/// Capabilities announced in `register_kit`.
fn capabilities() -> Vec<String> {
    ["apps", "logs", "signals", "sidecars"].iter().map(|s| s.to_string()).collect()
}

/// Connection loop with jittered exponential backoff. Runs until cancelled.
pub async fn run_hub_bridge(
    url: String,
    kit_id: String,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                tracing::info!(%url, %kit_id, "hub connected");
                backoff = INITIAL_BACKOFF;
                run_session(ws, &kit_id, &dispatcher, &cancel).await;
                if cancel.is_cancelled() {
                    break;
                }
                tracing::warn!(%url, "hub connection lost");
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "hub connect failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(jittered(backoff)) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// One connected session: register, then pump frames both ways.
async fn run_session(
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    kit_id: &str,
    dispatcher: &Dispatcher,
    cancel: &CancellationToken,
) {
    let (mut write, mut read) = ws.split();

    let register = RegisterKit::new(kit_id, capabilities());
    let frame = match serde_json::to_string(&register) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "register frame encode failed");
            return;
        }
    };
    if write.send(Message::text(frame)).await.is_err() {
        return;
    }

    let (reply_tx, mut reply_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE);
    // One runtime-side identity per remote client token, so subscriptions
    // and cleanup stay per-client even though they share the socket.
    let mut remote_clients: HashMap<String, ClientId> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            outbound = reply_rx.recv() => {
                if let Some(outbound) = outbound {
                    let text = match &outbound.request_from {
                        Some(token) => wrap_kit_reply(token, &outbound.frame),
                        None => outbound.frame,
                    };
                    if write.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match parse_hub_frame(&text) {
                        Some(HubInbound::MessageToKit { request_from, message }) => {
                            let client = remote_clients
                                .entry(request_from.clone())
                                .or_insert_with(ClientId::new)
                                .clone();
                            let ctx = RequestContext {
                                client,
                                request_from: Some(request_from.clone()),
                                reply_tx: reply_tx.clone(),
                            };
                            let inner = message.to_string();
                            if let Some(reply) =
                                dispatcher.dispatch_text(&inner, &ctx).await
                            {
                                let wrapped = wrap_kit_reply(&request_from, &reply);
                                if write.send(Message::text(wrapped)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(HubInbound::Other { frame_type }) => {
                            tracing::debug!(%frame_type, "ignoring hub frame");
                        }
                        None => {
                            tracing::debug!("dropping malformed hub frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "hub read error");
                    break;
                }
            }
        }
    }

    // Remote subscriptions do not survive the connection.
    for client in remote_clients.values() {
        drop_client(dispatcher.hub(), dispatcher.gateway(), client);
        dispatcher.forget_sink(client);
    }
}

/// Jitter from subsecond clock noise, up to +50% of the base delay.
fn jittered(base: std::time::Duration) -> std::time::Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    let jitter_ms = nanos % (base.as_millis().max(2) as u64 / 2);
    base + std::time::Duration::from_millis(jitter_ms)
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
