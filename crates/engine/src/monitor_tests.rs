// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::docker::{ContainerSpec, FakeEngine};
use sdv_core::{Application, LifecycleState, RestartPolicy};
use yare::parameterized;

fn snapshot(cpu_delta: u64, sys_delta: u64, cpus: u32) -> StatsSnapshot {
    StatsSnapshot {
        cpu_total_usage: 1_000_000 + cpu_delta,
        precpu_total_usage: 1_000_000,
        system_cpu_usage: 10_000_000 + sys_delta,
        pre_system_cpu_usage: 10_000_000,
        online_cpus: cpus,
        ..Default::default()
    }
}

#[parameterized(
    half_of_one_cpu = { 100, 200, 1, 50.0 },
    two_cores_busy = { 100, 200, 4, 200.0 },
)]
fn cpu_percent_formula(cpu_delta: u64, sys_delta: u64, cpus: u32, expected: f64) {
    let percent = cpu_percent(&snapshot(cpu_delta, sys_delta, cpus));
    assert!((percent - expected).abs() < 0.01, "expected {expected}, got {percent}");
}

#[test]
fn cpu_percent_counter_reset_is_zero() {
    let mut stats = snapshot(100, 200, 1);
    stats.precpu_total_usage = stats.cpu_total_usage + 5;
    assert_eq!(cpu_percent(&stats), 0.0);
}

#[test]
fn cpu_percent_zero_system_delta_is_zero() {
    assert_eq!(cpu_percent(&snapshot(100, 0, 1)), 0.0);
}

#[test]
fn memory_percent_guards_zero_limit() {
    let stats = StatsSnapshot { memory_usage: 1024, memory_limit: 0, ..Default::default() };
    let sample = to_sample(&stats);
    assert_eq!(sample.memory_percent, 0.0);
}

#[test]
fn breach_severities() {
    let mut sample = ResourceSample { cpu_percent: 85.0, ..Default::default() };
    let found = breaches(&sample, 0);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "cpu");
    assert_eq!(found[0].3, BreachSeverity::Warning);

    sample.cpu_percent = 95.0;
    sample.memory_percent = 92.0;
    let found = breaches(&sample, 0);
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|b| b.3 == BreachSeverity::Critical));
}

#[test]
fn disk_and_network_breaches_are_warnings() {
    let sample = ResourceSample {
        net_rx_bytes: 90 * 1024 * 1024,
        net_tx_bytes: 20 * 1024 * 1024,
        ..Default::default()
    };
    let found = breaches(&sample, 2 * 1024 * 1024 * 1024);
    let resources: Vec<&str> = found.iter().map(|b| b.0.as_str()).collect();
    assert_eq!(resources, vec!["disk", "network"]);
    assert!(found.iter().all(|b| b.3 == BreachSeverity::Warning));
}

#[test]
fn quiet_sample_has_no_breaches() {
    let sample = ResourceSample { cpu_percent: 10.0, memory_percent: 20.0, ..Default::default() };
    assert!(breaches(&sample, 0).is_empty());
}

fn installed_app(store: &Store, id: &str) -> AppId {
    let now = Utc::now();
    let app_id = AppId::parse(id).unwrap();
    store
        .insert_application(&Application {
            id: app_id.clone(),
            name: id.to_string(),
            description: None,
            version: None,
            app_type: sdv_core::AppType::Binary,
            code: None,
            entry_point: None,
            binary_path: Some("/bin/true".to_string()),
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
    app_id
}

#[tokio::test]
async fn sweep_samples_running_labeled_containers() {
    let store = Store::open_in_memory().unwrap();
    let app_id = installed_app(&store, "mon1");
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());

    let container = engine
        .create(&ContainerSpec::default().labeled_for(&app_id))
        .await
        .unwrap();
    engine.start(&container).await.unwrap();
    engine.set_stats(
        &container,
        StatsSnapshot {
            memory_usage: 512,
            memory_limit: 1024,
            ..snapshot(100, 200, 1)
        },
    );

    let (event_tx, _event_rx) = mpsc::channel(16);
    let monitor = ResourceMonitor::new(
        engine.clone(),
        store.clone(),
        StoragePaths::new(dir.path()),
        event_tx,
        Duration::from_secs(30),
    );
    monitor.sample_once().await;

    let history = monitor.history(&app_id);
    assert_eq!(history.len(), 1);
    assert!((history[0].cpu_percent - 50.0).abs() < 0.01);
    assert!((history[0].memory_percent - 50.0).abs() < 0.01);

    // Snapshot also lands on the persisted runtime state
    let state = store.get_runtime_state(&app_id).unwrap();
    assert!((state.resources.unwrap().cpu_percent - 50.0).abs() < 0.01);
    assert!(state.last_heartbeat.is_some());
}

#[tokio::test]
async fn sweep_emits_threshold_events() {
    let store = Store::open_in_memory().unwrap();
    let app_id = installed_app(&store, "mon2");
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());

    let container = engine
        .create(&ContainerSpec::default().labeled_for(&app_id))
        .await
        .unwrap();
    engine.start(&container).await.unwrap();
    // 95% of one CPU
    engine.set_stats(&container, snapshot(190, 200, 1));

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let monitor = ResourceMonitor::new(
        engine,
        store,
        StoragePaths::new(dir.path()),
        event_tx,
        Duration::from_secs(30),
    );
    monitor.sample_once().await;

    let event = event_rx.recv().await.unwrap();
    let Event::ThresholdBreach { app_id: event_app, resource, severity, .. } = event else {
        panic!("expected a breach event");
    };
    assert_eq!(event_app, app_id);
    assert_eq!(resource, "cpu");
    assert_eq!(severity, BreachSeverity::Critical);
}

#[tokio::test]
async fn stopped_containers_are_skipped() {
    let store = Store::open_in_memory().unwrap();
    let app_id = installed_app(&store, "mon3");
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());

    let container = engine
        .create(&ContainerSpec::default().labeled_for(&app_id))
        .await
        .unwrap();
    // never started
    let _ = container;

    let (event_tx, _event_rx) = mpsc::channel(16);
    let monitor = ResourceMonitor::new(
        engine,
        store,
        StoragePaths::new(dir.path()),
        event_tx,
        Duration::from_secs(30),
    );
    monitor.sample_once().await;
    assert!(monitor.history(&app_id).is_empty());
}
