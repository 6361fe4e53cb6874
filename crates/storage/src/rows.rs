// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row <-> domain type conversion helpers.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use sdv_core::{
    AppId, Application, ExecutionId, LifecycleState, ResourceSample, RuntimeState,
};

use crate::StoreError;

pub(crate) fn ts_to_sql(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {text:?}: {e}")))
}

pub(crate) fn opt_ts_from_sql(text: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.as_deref().map(ts_from_sql).transpose()
}

pub(crate) fn json_from_sql<T: serde::de::DeserializeOwned>(
    column: &str,
    text: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Corrupt(format!("bad json in {column}: {e}")))
}

pub(crate) fn json_to_sql<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(format!("encode: {e}")))
}

pub(crate) fn app_id_from_sql(text: &str) -> Result<AppId, StoreError> {
    AppId::parse(text).map_err(StoreError::Corrupt)
}

pub(crate) fn state_from_sql(text: &str) -> Result<LifecycleState, StoreError> {
    text.parse().map_err(StoreError::Corrupt)
}

/// Column order used by every `SELECT` on `applications`.
pub(crate) const APP_COLUMNS: &str = "id, name, description, version, app_type, code, \
     entry_point, binary_path, working_dir, args, env, python_deps, vehicle_signals, \
     data_path, config, status, auto_start, restart_policy, resources, created_at, updated_at";

pub(crate) fn application_from_row(row: &Row<'_>) -> Result<Application, StoreError> {
    let id: String = row.get(0)?;
    let app_type: String = row.get(4)?;
    let args: String = row.get(9)?;
    let env: String = row.get(10)?;
    let python_deps: String = row.get(11)?;
    let vehicle_signals: String = row.get(12)?;
    let data_path: Option<String> = row.get(13)?;
    let config: String = row.get(14)?;
    let status: String = row.get(15)?;
    let restart_policy: String = row.get(17)?;
    let resources: String = row.get(18)?;
    let created_at: String = row.get(19)?;
    let updated_at: String = row.get(20)?;

    Ok(Application {
        id: app_id_from_sql(&id)?,
        name: row.get(1)?,
        description: row.get(2)?,
        version: row.get(3)?,
        app_type: app_type.parse().map_err(StoreError::Corrupt)?,
        code: row.get(5)?,
        entry_point: row.get(6)?,
        binary_path: row.get(7)?,
        working_dir: row.get(8)?,
        args: json_from_sql("args", &args)?,
        env: json_from_sql("env", &env)?,
        python_deps: json_from_sql("python_deps", &python_deps)?,
        vehicle_signals: json_from_sql("vehicle_signals", &vehicle_signals)?,
        data_path: data_path.map(std::path::PathBuf::from),
        config: json_from_sql("config", &config)?,
        status: state_from_sql(&status)?,
        auto_start: row.get::<_, i64>(16)? != 0,
        restart_policy: restart_policy.parse().map_err(StoreError::Corrupt)?,
        resources: json_from_sql("resources", &resources)?,
        created_at: ts_from_sql(&created_at)?,
        updated_at: ts_from_sql(&updated_at)?,
    })
}

/// Column order used by every `SELECT` on `runtime_state`.
pub(crate) const STATE_COLUMNS: &str = "app_id, execution_id, container_id, pid, last_start, \
     last_exit, exit_code, total_runtime_secs, current_state, last_heartbeat, resources";

pub(crate) fn runtime_state_from_row(row: &Row<'_>) -> Result<RuntimeState, StoreError> {
    let app_id: String = row.get(0)?;
    let execution_id: Option<String> = row.get(1)?;
    let last_start: Option<String> = row.get(4)?;
    let last_exit: Option<String> = row.get(5)?;
    let total_runtime_secs: i64 = row.get(7)?;
    let current_state: String = row.get(8)?;
    let last_heartbeat: Option<String> = row.get(9)?;
    let resources: Option<String> = row.get(10)?;

    let resources: Option<ResourceSample> = resources
        .as_deref()
        .map(|text| json_from_sql("resources", text))
        .transpose()?;

    Ok(RuntimeState {
        app_id: app_id_from_sql(&app_id)?,
        execution_id: execution_id.map(ExecutionId::from_string),
        container_id: row.get(2)?,
        pid: row.get(3)?,
        last_start: opt_ts_from_sql(last_start)?,
        last_exit: opt_ts_from_sql(last_exit)?,
        exit_code: row.get(6)?,
        total_runtime_secs: total_runtime_secs.max(0) as u64,
        current_state: state_from_sql(&current_state)?,
        last_heartbeat: opt_ts_from_sql(last_heartbeat)?,
        resources,
    })
}
