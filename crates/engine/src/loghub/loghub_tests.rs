// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use sdv_core::{Application, LifecycleState, RestartPolicy};
use sdv_storage::LogQuery;

fn seeded_store(app: &str) -> (Store, AppId) {
    let store = Store::open_in_memory().unwrap();
    let now = Utc::now();
    let app_id = AppId::parse(app).unwrap();
    store
        .insert_application(&Application {
            id: app_id.clone(),
            name: app.to_string(),
            description: None,
            version: None,
            app_type: sdv_core::AppType::Python,
            code: Some("print('hi')".to_string()),
            entry_point: Some("main.py".to_string()),
            binary_path: None,
            working_dir: None,
            args: vec![],
            env: Default::default(),
            python_deps: vec![],
            vehicle_signals: vec![],
            data_path: None,
            config: Default::default(),
            status: LifecycleState::Installed,
            auto_start: false,
            restart_policy: RestartPolicy::Never,
            resources: Default::default(),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    (store, app_id)
}

fn hub_with(app: &str) -> (LogHub, Store, AppId, tempfile::TempDir) {
    let (store, app_id) = seeded_store(app);
    let dir = tempfile::tempdir().unwrap();
    let hub = LogHub::new(store.clone(), dir.path().join("logs"), LogHubConfig::default());
    (hub, store, app_id, dir)
}

#[tokio::test]
async fn lines_are_sequenced_and_replayed() {
    let (hub, _store, app_id, _dir) = hub_with("h1");

    hub.publish(&app_id, LogStreamKind::Stdout, b"one\ntwo\n");
    hub.publish(&app_id, LogStreamKind::Stdout, b"three\n");

    let client = ClientId::new();
    let (sub, replayed) = hub.subscribe(&client, &app_id);
    assert_eq!(replayed, 3);

    for (expected_seq, expected) in [(1u64, "one"), (2, "two"), (3, "three")] {
        let line = sub.recv().await.unwrap();
        assert_eq!(line.seq, expected_seq);
        assert_eq!(line.content, expected);
    }
}

#[tokio::test]
async fn partial_chunks_join_into_one_line() {
    let (hub, _store, app_id, _dir) = hub_with("h2");

    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    hub.publish(&app_id, LogStreamKind::Stdout, b"hel");
    hub.publish(&app_id, LogStreamKind::Stdout, b"lo wor");
    hub.publish(&app_id, LogStreamKind::Stdout, b"ld\n");

    let line = sub.recv().await.unwrap();
    assert_eq!(line.content, "hello world");
}

#[tokio::test]
async fn idle_timeout_flushes_dangling_partial() {
    let (store, app_id) = seeded_store("h3");
    let dir = tempfile::tempdir().unwrap();
    let config = LogHubConfig {
        idle_flush: Duration::from_millis(20),
        ..Default::default()
    };
    let hub = LogHub::new(store, dir.path().join("logs"), config);

    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    hub.publish(&app_id, LogStreamKind::Stdout, b"no newline");
    let line = tokio::time::timeout(Duration::from_millis(500), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.content, "no newline");
}

#[tokio::test]
async fn streams_keep_separate_partials() {
    let (hub, _store, app_id, _dir) = hub_with("h4");
    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    hub.publish(&app_id, LogStreamKind::Stdout, b"out-");
    hub.publish(&app_id, LogStreamKind::Stderr, b"err\n");
    hub.publish(&app_id, LogStreamKind::Stdout, b"done\n");

    let first = sub.recv().await.unwrap();
    assert_eq!(first.stream, LogStreamKind::Stderr);
    assert_eq!(first.content, "err");
    let second = sub.recv().await.unwrap();
    assert_eq!(second.content, "out-done");
}

#[tokio::test]
async fn ansi_is_stripped_and_json_fields_override() {
    let (hub, _store, app_id, _dir) = hub_with("h5");
    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    hub.publish(&app_id, LogStreamKind::Stdout, b"\x1b[31mred alert\x1b[0m\n");
    assert_eq!(sub.recv().await.unwrap().content, "red alert");

    hub.publish(
        &app_id,
        LogStreamKind::Stdout,
        br#"{"msg":"structured","timestamp":"2026-07-01T08:00:00Z"}
"#,
    );
    let line = sub.recv().await.unwrap();
    assert_eq!(line.content, "structured");
    assert_eq!(line.timestamp.to_rfc3339(), "2026-07-01T08:00:00+00:00");
}

#[tokio::test]
async fn ring_evicts_oldest_but_keeps_sequences() {
    let (store, app_id) = seeded_store("h6");
    let dir = tempfile::tempdir().unwrap();
    let config = LogHubConfig { max_lines: 5, replay_lines: 100, ..Default::default() };
    let hub = LogHub::new(store, dir.path().join("logs"), config);

    for n in 1..=8 {
        hub.publish(&app_id, LogStreamKind::Stdout, format!("line {n}\n").as_bytes());
    }

    let client = ClientId::new();
    let (sub, replayed) = hub.subscribe(&client, &app_id);
    assert_eq!(replayed, 5);
    let first = sub.recv().await.unwrap();
    assert_eq!(first.seq, 4, "oldest three evicted, sequences preserved");
}

#[tokio::test]
async fn slow_subscriber_gets_drop_sentinel_oldest_first() {
    let (store, app_id) = seeded_store("h7");
    let dir = tempfile::tempdir().unwrap();
    let config = LogHubConfig { subscriber_queue: 4, ..Default::default() };
    let hub = LogHub::new(store, dir.path().join("logs"), config);

    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    // 7 lines into a queue of 4: lines 1..3 fall out the old end
    for n in 1..=7 {
        hub.publish(&app_id, LogStreamKind::Stdout, format!("line {n}\n").as_bytes());
    }

    let sentinel = sub.recv().await.unwrap();
    assert_eq!(sentinel.stream, LogStreamKind::System);
    assert_eq!(sentinel.content, "3 lines dropped");
    assert_eq!(sentinel.seq, 1, "sentinel takes the first dropped sequence");

    // Then the newest window, in order
    for expected in 4u64..=7 {
        let line = sub.recv().await.unwrap();
        assert_eq!(line.seq, expected);
    }
}

#[tokio::test]
async fn unsubscribe_closes_the_stream() {
    let (hub, _store, app_id, _dir) = hub_with("h8");
    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    assert_eq!(hub.unsubscribe(&client, Some(&app_id)), 1);
    assert!(sub.recv().await.is_none());

    // Unsubscribing again removes nothing
    assert_eq!(hub.unsubscribe(&client, Some(&app_id)), 0);
}

#[tokio::test]
async fn lines_reach_store_and_file_sink() {
    let (hub, store, app_id, dir) = hub_with("h9");

    hub.publish(&app_id, LogStreamKind::Stdout, b"persist me\n");
    hub.shutdown().await; // drains the writer

    let stored = store.read_logs(&app_id, &LogQuery::default()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "persist me");
    assert_eq!(stored[0].seq, 1);

    let sink = dir.path().join("logs").join(format!("{app_id}.log"));
    assert!(std::fs::read_to_string(sink).unwrap().contains("persist me"));
}

#[tokio::test]
async fn sequences_continue_across_hub_restarts() {
    let (store, app_id) = seeded_store("h10");
    let dir = tempfile::tempdir().unwrap();

    let hub = LogHub::new(store.clone(), dir.path().join("logs"), LogHubConfig::default());
    hub.publish(&app_id, LogStreamKind::Stdout, b"before\n");
    hub.shutdown().await;

    let hub = LogHub::new(store.clone(), dir.path().join("logs"), LogHubConfig::default());
    hub.publish(&app_id, LogStreamKind::Stdout, b"after\n");
    hub.shutdown().await;

    let stored = store.read_logs(&app_id, &LogQuery::default()).unwrap();
    assert_eq!(stored.iter().map(|l| l.seq).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn tail_attach_streams_container_output() {
    let (hub, _store, app_id, _dir) = hub_with("h11");
    let engine = Arc::new(crate::docker::FakeEngine::new());
    let container = engine
        .create(&crate::docker::ContainerSpec::default().labeled_for(&app_id))
        .await
        .unwrap();
    engine.start(&container).await.unwrap();

    let client = ClientId::new();
    let (sub, _) = hub.subscribe(&client, &app_id);

    hub.attach_container(&app_id, &container, engine.clone());
    engine.push_log(&container, LogStreamKind::Stdout, b"from container\n");

    let line = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.content, "from container");

    hub.detach_container(&app_id);
}

#[tokio::test]
async fn publish_for_unknown_app_is_dropped() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let hub = LogHub::new(store.clone(), dir.path().join("logs"), LogHubConfig::default());

    // Never inserted; nothing should panic or persist
    let ghost = AppId::parse("ghost").unwrap();
    hub.publish(&ghost, LogStreamKind::Stdout, b"void\n");
    hub.shutdown().await;
}
