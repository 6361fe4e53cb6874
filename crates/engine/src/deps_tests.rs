// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::docker::FakeEngine;
use chrono::Utc;
use sdv_core::{LifecycleState, RestartPolicy};
use yare::parameterized;

#[parameterized(
    bare = { "requests", "requests", None },
    pinned = { "requests==2.31.0", "requests", Some("==2.31.0") },
    ranged = { "numpy>=1.20,<2", "numpy", Some(">=1.20,<2") },
    compat = { "flask~=3.0", "flask", Some("~=3.0") },
    extras = { "uvicorn[standard]>=0.2", "uvicorn", Some("[standard]>=0.2") },
)]
fn specifier_split(spec: &str, name: &str, version: Option<&str>) {
    assert_eq!(split_specifier(spec), (name, version));
}

fn python_app(store: &Store, id: &str, deps: &[&str]) -> Application {
    let now = Utc::now();
    let app = Application {
        id: AppId::parse(id).unwrap(),
        name: id.to_string(),
        description: None,
        version: None,
        app_type: sdv_core::AppType::Python,
        code: Some("print('hi')".to_string()),
        entry_point: Some("main.py".to_string()),
        binary_path: None,
        working_dir: None,
        args: vec![],
        env: Default::default(),
        python_deps: deps.iter().map(|s| s.to_string()).collect(),
        vehicle_signals: vec!["Vehicle.Speed".to_string()],
        data_path: None,
        config: Default::default(),
        status: LifecycleState::Installed,
        auto_start: false,
        restart_policy: RestartPolicy::Never,
        resources: Default::default(),
        created_at: now,
        updated_at: now,
    };
    store.insert_application(&app).unwrap();
    app
}

#[tokio::test]
async fn no_deps_records_signals_and_skips_install() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let engine: Arc<dyn ContainerEngine> = Arc::new(FakeEngine::new());
    let app = python_app(&store, "nodeps", &[]);

    let mounted =
        materialize(&engine, &store, &StoragePaths::new(dir.path()), &app).await.unwrap();
    assert!(mounted.is_none());

    let recorded = store.list_dependencies(&app.id).unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, DependencyKind::VehicleSignal);
}

#[tokio::test]
async fn install_runs_pip_container_and_writes_manifest() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEngine::new());
    let engine: Arc<dyn ContainerEngine> = fake.clone();
    let app = python_app(&store, "withdeps", &["requests>=2", "numpy"]);

    let paths = StoragePaths::new(dir.path());
    let mounted = materialize(&engine, &store, &paths, &app).await.unwrap().unwrap();
    assert_eq!(mounted, paths.deps_dir(&app.id));

    let calls = fake.cli_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0], "run");
    assert!(calls[0].contains(&"pip".to_string()));
    assert!(calls[0].contains(&"requests>=2".to_string()));

    let manifest = std::fs::read_to_string(mounted.join("requirements.txt")).unwrap();
    assert_eq!(manifest, "requests>=2\nnumpy");

    let pkgs: Vec<_> = store
        .list_dependencies(&app.id)
        .unwrap()
        .into_iter()
        .filter(|d| d.kind == DependencyKind::PythonPkg)
        .collect();
    assert_eq!(pkgs.len(), 2);
}

#[tokio::test]
async fn unchanged_requirements_hit_the_cache() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEngine::new());
    let engine: Arc<dyn ContainerEngine> = fake.clone();
    let app = python_app(&store, "cached", &["requests"]);
    let paths = StoragePaths::new(dir.path());

    materialize(&engine, &store, &paths, &app).await.unwrap();
    materialize(&engine, &store, &paths, &app).await.unwrap();

    // Second call reused the cache: still only one pip run
    assert_eq!(fake.cli_calls().len(), 1);
}

#[tokio::test]
async fn changed_requirements_reinstall() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEngine::new());
    let engine: Arc<dyn ContainerEngine> = fake.clone();
    let paths = StoragePaths::new(dir.path());

    let mut app = python_app(&store, "changing", &["requests"]);
    materialize(&engine, &store, &paths, &app).await.unwrap();

    app.python_deps = vec!["requests".to_string(), "flask".to_string()];
    materialize(&engine, &store, &paths, &app).await.unwrap();

    assert_eq!(fake.cli_calls().len(), 2);
}

#[tokio::test]
async fn failed_install_surfaces_engine_error() {
    let store = Store::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeEngine::new());
    let engine: Arc<dyn ContainerEngine> = fake.clone();
    let app = python_app(&store, "broken", &["no-such-pkg==99"]);

    fake.script_cli(Err("pip exploded"));
    let err = materialize(&engine, &store, &StoragePaths::new(dir.path()), &app)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Engine(_)));
}
