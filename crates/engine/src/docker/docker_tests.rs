// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use futures_util::StreamExt;
use sdv_core::AppId;

fn spec_for(app: &str) -> ContainerSpec {
    ContainerSpec {
        image: "python:3.11-slim".to_string(),
        command: vec!["python".to_string(), "main.py".to_string()],
        ..Default::default()
    }
    .labeled_for(&AppId::parse(app).unwrap())
}

#[test]
fn labeled_spec_carries_ownership_labels() {
    let spec = spec_for("my-app");
    assert_eq!(spec.labels.get(LABEL_RUNTIME).map(String::as_str), Some(LABEL_RUNTIME_VALUE));
    assert_eq!(spec.labels.get(LABEL_APP_ID).map(String::as_str), Some("my-app"));
}

#[tokio::test]
async fn fake_lifecycle_round_trip() {
    let engine = FakeEngine::new();
    let id = engine.create(&spec_for("app1")).await.unwrap();

    let state = engine.inspect(&id).await.unwrap();
    assert!(!state.running);

    engine.start(&id).await.unwrap();
    let state = engine.inspect(&id).await.unwrap();
    assert!(state.running);
    assert_eq!(state.app_id(), Some("app1"));

    engine.stop(&id, std::time::Duration::from_secs(5)).await.unwrap();
    let state = engine.inspect(&id).await.unwrap();
    assert!(!state.running);
    assert_eq!(state.exit_code, Some(0));

    engine.remove(&id, false).await.unwrap();
    assert!(matches!(engine.inspect(&id).await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn wait_resolves_on_scripted_exit() {
    let engine = FakeEngine::new();
    let id = engine.create(&spec_for("app2")).await.unwrap();
    engine.start(&id).await.unwrap();

    let waiter = {
        let engine = engine.clone();
        let id = id.clone();
        tokio::spawn(async move { engine.wait(&id).await })
    };
    engine.script_exit(&id, 3);

    let info = waiter.await.unwrap().unwrap();
    assert_eq!(info.exit_code, Some(3));
}

#[tokio::test]
async fn log_stream_replays_then_follows() {
    let engine = FakeEngine::new();
    let id = engine.create(&spec_for("app3")).await.unwrap();
    engine.start(&id).await.unwrap();
    engine.push_log(&id, sdv_core::LogStreamKind::Stdout, b"early\n");

    let mut stream = engine.logs(&id, true, None).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.bytes, b"early\n");

    engine.push_log(&id, sdv_core::LogStreamKind::Stderr, b"late\n");
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.stream, sdv_core::LogStreamKind::Stderr);

    // Exit ends the stream
    engine.script_exit(&id, 0);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn list_by_label_filters() {
    let engine = FakeEngine::new();
    let a = engine.create(&spec_for("alpha")).await.unwrap();
    let _b = engine
        .create(&ContainerSpec { image: "other".to_string(), ..Default::default() })
        .await
        .unwrap();

    let owned = engine.list_by_label(LABEL_RUNTIME, LABEL_RUNTIME_VALUE).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, a);
}

#[tokio::test]
async fn fail_next_injects_errors() {
    let engine = FakeEngine::new();
    engine.fail_next("create", "boom");
    assert!(matches!(
        engine.create(&spec_for("x")).await,
        Err(EngineError::Rejected(msg)) if msg == "boom"
    ));
    // Next call succeeds again
    assert!(engine.create(&spec_for("x")).await.is_ok());
}

#[tokio::test]
async fn cli_run_mints_container() {
    let engine = FakeEngine::new();
    let tokens: Vec<String> =
        ["run", "-d", "--name", "nginx-test", "nginx:alpine"].iter().map(|s| s.to_string()).collect();
    let output = engine.run_cli(&tokens).await.unwrap();
    let id = output.container_id.unwrap();
    assert!(engine.exists(&id));
    assert_eq!(engine.cli_calls().len(), 1);

    // Non-run commands do not
    let output = engine.run_cli(&["ps".to_string()]).await.unwrap();
    assert!(output.container_id.is_none());
}
