// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

fn base_app(app_type: AppType) -> Application {
    Application {
        id: AppId::parse("test-app").unwrap(),
        name: "Test".to_string(),
        description: None,
        version: None,
        app_type,
        code: None,
        entry_point: None,
        binary_path: None,
        working_dir: None,
        args: vec![],
        env: Default::default(),
        python_deps: vec![],
        vehicle_signals: vec![],
        data_path: None,
        config: Default::default(),
        status: crate::LifecycleState::Installed,
        auto_start: false,
        restart_policy: RestartPolicy::Never,
        resources: ResourceLimits::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn python_requires_code_and_entry_point() {
    let mut app = base_app(AppType::Python);
    assert!(app.validate().is_err());

    app.entry_point = Some("main.py".into());
    assert!(app.validate().is_err());

    app.code = Some("print('hi')".into());
    assert!(app.validate().is_ok());
}

#[test]
fn binary_requires_binary_path() {
    let mut app = base_app(AppType::Binary);
    assert!(app.validate().is_err());

    app.binary_path = Some("/usr/local/bin/tool".into());
    assert!(app.validate().is_ok());
}

#[test]
fn container_requires_docker_command() {
    let mut app = base_app(AppType::Container);
    assert!(app.validate().is_err());

    app.config.insert("dockerCommand".into(), serde_json::json!([]));
    assert!(app.validate().is_err());

    app.config
        .insert("dockerCommand".into(), serde_json::json!(["run", "-d", "nginx:alpine"]));
    assert!(app.validate().is_ok());
    assert_eq!(
        app.docker_command().unwrap(),
        vec!["run".to_string(), "-d".to_string(), "nginx:alpine".to_string()]
    );
}

#[test]
fn app_type_accepts_docker_alias() {
    let t: AppType = serde_json::from_str("\"docker\"").unwrap();
    assert_eq!(t, AppType::Container);
    let t: AppType = serde_json::from_str("\"container\"").unwrap();
    assert_eq!(t, AppType::Container);
    // Canonical spelling on output
    assert_eq!(serde_json::to_string(&AppType::Container).unwrap(), "\"container\"");
}

#[test]
fn application_serde_round_trip() {
    let mut app = base_app(AppType::Python);
    app.code = Some("print('hi')".into());
    app.entry_point = Some("main.py".into());
    app.args = vec!["--verbose".into()];
    app.env.insert("KEY".into(), "value".into());
    app.python_deps = vec!["requests>=2".into()];

    let json = serde_json::to_string(&app).unwrap();
    let back: Application = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, app.id);
    assert_eq!(back.app_type, AppType::Python);
    assert_eq!(back.env.get("KEY").map(String::as_str), Some("value"));
}

#[test]
fn restart_policy_round_trips() {
    for p in ["never", "on_failure", "always"] {
        let policy: RestartPolicy = p.parse().unwrap();
        assert_eq!(policy.as_str(), p);
    }
}
