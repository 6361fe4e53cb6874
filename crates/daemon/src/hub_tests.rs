// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatch::tests::harness;
use futures_util::SinkExt;
use tokio::net::TcpListener;

/// Minimal in-process hub: accepts one runtime connection and exposes its
/// frames.
struct FakeHub {
    url: String,
    accepted: tokio::sync::mpsc::Receiver<HubConn>,
}

struct HubConn {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        Message,
    >,
    frames: tokio::sync::mpsc::Receiver<serde_json::Value>,
}

async fn fake_hub() -> FakeHub {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (conn_tx, accepted) = tokio::sync::mpsc::channel(4);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else { continue };
            let (write, mut read) = ws.split();
            let (frame_tx, frame_rx) = tokio::sync::mpsc::channel(64);
            tokio::spawn(async move {
                while let Some(Ok(Message::Text(text))) = read.next().await {
                    if let Ok(value) = serde_json::from_str(&text) {
                        let _ = frame_tx.send(value).await;
                    }
                }
            });
            if conn_tx.send(HubConn { write, frames: frame_rx }).await.is_err() {
                break;
            }
        }
    });

    FakeHub { url: format!("ws://{addr}"), accepted }
}

async fn next_frame(conn: &mut HubConn) -> serde_json::Value {
    tokio::time::timeout(std::time::Duration::from_secs(3), conn.frames.recv())
        .await
        .expect("frame before timeout")
        .expect("hub connection open")
}

#[tokio::test]
async fn bridge_registers_on_connect() {
    let mut hub = fake_hub().await;
    let h = harness();
    let cancel = CancellationToken::new();
    tokio::spawn(run_hub_bridge(
        hub.url.clone(),
        "kit-42".to_string(),
        h.dispatcher.clone(),
        cancel.clone(),
    ));

    let mut conn = hub.accepted.recv().await.expect("runtime connects");
    let register = next_frame(&mut conn).await;
    assert_eq!(register["type"], "register_kit");
    assert_eq!(register["kit_id"], "kit-42");
    assert!(register["capabilities"].as_array().unwrap().contains(&serde_json::json!("apps")));

    cancel.cancel();
}

#[tokio::test]
async fn remote_request_is_dispatched_and_reply_wrapped() {
    let mut hub = fake_hub().await;
    let h = harness();
    let cancel = CancellationToken::new();
    tokio::spawn(run_hub_bridge(
        hub.url.clone(),
        "kit-42".to_string(),
        h.dispatcher.clone(),
        cancel.clone(),
    ));

    let mut conn = hub.accepted.recv().await.expect("runtime connects");
    let _register = next_frame(&mut conn).await;

    let inbound = serde_json::json!({
        "type": "messageToKit",
        "request_from": "R1",
        "message": { "type": "ping", "id": "p1" }
    });
    conn.write.send(Message::text(inbound.to_string())).await.unwrap();

    let reply = next_frame(&mut conn).await;
    assert_eq!(reply["type"], "messageToKit-kitReply");
    assert_eq!(reply["request_from"], "R1");
    assert_eq!(reply["inner_type"], "pong");
    assert_eq!(reply["id"], "p1");

    cancel.cancel();
}

#[tokio::test]
async fn remote_log_stream_carries_the_token() {
    let mut hub = fake_hub().await;
    let h = harness();
    let cancel = CancellationToken::new();
    tokio::spawn(run_hub_bridge(
        hub.url.clone(),
        "kit-42".to_string(),
        h.dispatcher.clone(),
        cancel.clone(),
    ));

    let mut conn = hub.accepted.recv().await.expect("runtime connects");
    let _register = next_frame(&mut conn).await;

    let deploy = serde_json::json!({
        "type": "messageToKit",
        "request_from": "R1",
        "message": {
            "type": "deploy_request",
            "id": "d1",
            "prototype": { "id": "remoteapp", "type": "python", "code": "x" }
        }
    });
    conn.write.send(Message::text(deploy.to_string())).await.unwrap();
    let reply = next_frame(&mut conn).await;
    assert_eq!(reply["request_from"], "R1");
    assert_eq!(reply["status"], "started");

    let subscribe = serde_json::json!({
        "type": "messageToKit",
        "request_from": "R1",
        "message": { "type": "app_log_subscribe", "id": "s1", "appId": "remoteapp" }
    });
    conn.write.send(Message::text(subscribe.to_string())).await.unwrap();
    let reply = next_frame(&mut conn).await;
    assert_eq!(reply["inner_type"], "app_log_subscribe-response");

    // A log line produced by the container reaches the hub wrapped with the
    // originating client's token
    let app_id = sdv_core::AppId::parse("remoteapp").unwrap();
    let container = h
        .manager
        .ctx()
        .store
        .get_runtime_state(&app_id)
        .unwrap()
        .container_id
        .unwrap();
    h.engine.push_log(&container, sdv_core::LogStreamKind::Stdout, b"hub line\n");

    let push = next_frame(&mut conn).await;
    assert_eq!(push["type"], "messageToKit-kitReply");
    assert_eq!(push["request_from"], "R1");
    assert_eq!(push["inner_type"], "app_output");
    assert_eq!(push["content"], "hub line");

    cancel.cancel();
}

#[tokio::test]
async fn non_message_frames_are_ignored() {
    let mut hub = fake_hub().await;
    let h = harness();
    let cancel = CancellationToken::new();
    tokio::spawn(run_hub_bridge(
        hub.url.clone(),
        "kit-42".to_string(),
        h.dispatcher.clone(),
        cancel.clone(),
    ));

    let mut conn = hub.accepted.recv().await.expect("runtime connects");
    let _register = next_frame(&mut conn).await;

    conn.write
        .send(Message::text(r#"{"type":"list-all-kits"}"#))
        .await
        .unwrap();
    conn.write.send(Message::text("garbage")).await.unwrap();

    // Still responsive afterwards
    let ping = serde_json::json!({
        "type": "messageToKit",
        "request_from": "R9",
        "message": { "type": "ping", "id": "alive" }
    });
    conn.write.send(Message::text(ping.to_string())).await.unwrap();
    let reply = next_frame(&mut conn).await;
    assert_eq!(reply["inner_type"], "pong");

    cancel.cancel();
}

#[tokio::test]
async fn bridge_reconnects_and_reregisters() {
    let mut hub = fake_hub().await;
    let h = harness();
    let cancel = CancellationToken::new();
    tokio::spawn(run_hub_bridge(
        hub.url.clone(),
        "kit-42".to_string(),
        h.dispatcher.clone(),
        cancel.clone(),
    ));

    let mut first = hub.accepted.recv().await.expect("first connection");
    let register = next_frame(&mut first).await;
    assert_eq!(register["type"], "register_kit");

    // Drop the connection; the bridge must come back and re-register
    drop(first);

    let mut second = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        hub.accepted.recv(),
    )
    .await
    .expect("reconnect before timeout")
    .expect("second connection");
    let register = next_frame(&mut second).await;
    assert_eq!(register["type"], "register_kit");
    assert_eq!(register["kit_id"], "kit-42");

    cancel.cancel();
}

#[test]
fn jitter_stays_within_half_base() {
    for _ in 0..32 {
        let base = std::time::Duration::from_secs(2);
        let jittered = jittered(base);
        assert!(jittered >= base);
        assert!(jittered <= base + std::time::Duration::from_millis(1000));
    }
}
