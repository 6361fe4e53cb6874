// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use sdv_core::{ApplicationPatch, DependencyKind, LifecycleState, RestartPolicy};

pub(crate) fn sample_app(id: &str) -> Application {
    let now = Utc::now();
    Application {
        id: AppId::parse(id).unwrap(),
        name: format!("App {id}"),
        description: Some("test app".to_string()),
        version: Some("1.0.0".to_string()),
        app_type: AppType::Python,
        code: Some("print('hi')".to_string()),
        entry_point: Some("main.py".to_string()),
        binary_path: None,
        working_dir: None,
        args: vec!["--flag".to_string()],
        env: [("K".to_string(), "V".to_string())].into_iter().collect(),
        python_deps: vec!["requests>=2".to_string()],
        vehicle_signals: vec!["Vehicle.Speed".to_string()],
        data_path: None,
        config: serde_json::Map::new(),
        status: LifecycleState::Installed,
        auto_start: false,
        restart_policy: RestartPolicy::Never,
        resources: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn insert_then_get_round_trips() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("a1");
    store.insert_application(&app).unwrap();

    let loaded = store.get_application(&app.id).unwrap();
    assert_eq!(loaded.name, app.name);
    assert_eq!(loaded.app_type, AppType::Python);
    assert_eq!(loaded.args, app.args);
    assert_eq!(loaded.env, app.env);
    assert_eq!(loaded.python_deps, app.python_deps);
    assert_eq!(loaded.status, LifecycleState::Installed);

    // Install also creates the runtime-state row
    let state = store.get_runtime_state(&app.id).unwrap();
    assert_eq!(state.current_state, LifecycleState::Installed);
}

#[test]
fn duplicate_insert_is_conflict() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("dup");
    store.insert_application(&app).unwrap();
    let err = store.insert_application(&app).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(id) if id == "dup"));
}

#[test]
fn get_missing_is_not_found() {
    let store = Store::open_in_memory().unwrap();
    let err = store.get_application(&AppId::parse("nope").unwrap()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn update_patches_and_bumps_updated_at() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("patch");
    store.insert_application(&app).unwrap();

    let later = app.updated_at + chrono::Duration::seconds(10);
    let patch = ApplicationPatch {
        name: Some("Renamed".to_string()),
        auto_start: Some(true),
        ..Default::default()
    };
    let updated = store.update_application(&app.id, &patch, later).unwrap();
    assert_eq!(updated.name, "Renamed");
    assert!(updated.auto_start);
    assert!(updated.updated_at > app.updated_at);
    // Untouched fields survive
    assert_eq!(updated.code.as_deref(), Some("print('hi')"));
}

#[test]
fn status_patch_syncs_runtime_state() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("sync");
    store.insert_application(&app).unwrap();

    let patch =
        ApplicationPatch { status: Some(LifecycleState::Error), ..Default::default() };
    store.update_application(&app.id, &patch, Utc::now()).unwrap();

    let state = store.get_runtime_state(&app.id).unwrap();
    assert_eq!(state.current_state, LifecycleState::Error);
}

#[test]
fn delete_cascades_to_children() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("gone");
    store.insert_application(&app).unwrap();
    store
        .append_log(&app.id, sdv_core::LogStreamKind::Stdout, "line", Utc::now())
        .unwrap();
    store
        .record_dependency(&sdv_core::Dependency {
            app_id: app.id.clone(),
            kind: DependencyKind::PythonPkg,
            name: "requests".to_string(),
            version_spec: Some(">=2".to_string()),
            resolved_version: None,
        })
        .unwrap();

    store.delete_application(&app.id).unwrap();

    assert!(matches!(store.get_application(&app.id), Err(StoreError::NotFound(_))));
    assert!(matches!(store.get_runtime_state(&app.id), Err(StoreError::NotFound(_))));
    assert!(store.read_logs(&app.id, &Default::default()).unwrap().is_empty());
    assert!(store.list_dependencies(&app.id).unwrap().is_empty());

    // Deleting again reports NotFound
    assert!(matches!(store.delete_application(&app.id), Err(StoreError::NotFound(_))));
}

#[test]
fn list_filters_by_status_type_and_name() {
    let store = Store::open_in_memory().unwrap();
    let mut py = sample_app("py1");
    py.name = "Sensor reader".to_string();
    store.insert_application(&py).unwrap();

    let mut bin = sample_app("bin1");
    bin.app_type = AppType::Binary;
    bin.binary_path = Some("/bin/tool".to_string());
    bin.name = "Diagnostics".to_string();
    store.insert_application(&bin).unwrap();

    let all = store.list_applications(&AppFilter::default()).unwrap();
    assert_eq!(all.len(), 2);

    let typed = store
        .list_applications(&AppFilter { app_type: Some(AppType::Binary), ..Default::default() })
        .unwrap();
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].id.as_str(), "bin1");

    let named = store
        .list_applications(&AppFilter {
            name_like: Some("%sensor%".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].id.as_str(), "py1");

    let running = store
        .list_applications(&AppFilter {
            status: Some(LifecycleState::Running),
            ..Default::default()
        })
        .unwrap();
    assert!(running.is_empty());
}

#[test]
fn dependency_record_replaces_on_same_key() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("deps");
    store.insert_application(&app).unwrap();

    let mut dep = sdv_core::Dependency {
        app_id: app.id.clone(),
        kind: DependencyKind::PythonPkg,
        name: "requests".to_string(),
        version_spec: Some(">=2".to_string()),
        resolved_version: None,
    };
    store.record_dependency(&dep).unwrap();
    dep.resolved_version = Some("2.31.0".to_string());
    store.record_dependency(&dep).unwrap();

    let deps = store.list_dependencies(&app.id).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].resolved_version.as_deref(), Some("2.31.0"));
}

#[test]
fn deploy_history_is_newest_first_and_capped() {
    let store = Store::open_in_memory().unwrap();
    let app = sample_app("hist");
    store.insert_application(&app).unwrap();

    for action in ["deploy", "start", "stop"] {
        store.record_deploy(&app.id, None, action, None, Utc::now()).unwrap();
    }

    let records = store.list_deploy_history(&app.id, 2).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, "stop");
    assert_eq!(records[1].action, "start");
}
