// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store handle and application registry operations.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use sdv_core::{AppId, AppType, Application, Dependency, ExecutionId, LifecycleState};

use crate::rows;
use crate::schema;
use crate::StoreError;

/// Filter for [`Store::list_applications`].
#[derive(Debug, Clone, Default)]
pub struct AppFilter {
    pub status: Option<LifecycleState>,
    pub app_type: Option<AppType>,
    /// SQL LIKE pattern matched against the name (e.g. `%sensor%`).
    pub name_like: Option<String>,
}

/// One deploy-history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployRecord {
    pub app_id: AppId,
    pub execution_id: Option<ExecutionId>,
    pub action: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Handle to the runtime database. Cheap to clone; all clones share one
/// connection behind a mutex.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Insert a new application and its initial runtime state.
    ///
    /// Fails with [`StoreError::Conflict`] when the id already exists; the
    /// caller decides whether to patch instead.
    pub fn insert_application(&self, app: &Application) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM applications WHERE id = ?1",
                [app.id.as_str()],
                |_| Ok(()),
            )
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })?;
        if exists {
            return Err(StoreError::Conflict(app.id.to_string()));
        }

        tx.execute(
            "INSERT INTO applications (id, name, description, version, app_type, code, \
             entry_point, binary_path, working_dir, args, env, python_deps, vehicle_signals, \
             data_path, config, status, auto_start, restart_policy, resources, created_at, \
             updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21)",
            rusqlite::params![
                app.id.as_str(),
                app.name,
                app.description,
                app.version,
                app.app_type.as_str(),
                app.code,
                app.entry_point,
                app.binary_path,
                app.working_dir,
                rows::json_to_sql(&app.args)?,
                rows::json_to_sql(&app.env)?,
                rows::json_to_sql(&app.python_deps)?,
                rows::json_to_sql(&app.vehicle_signals)?,
                app.data_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                rows::json_to_sql(&app.config)?,
                app.status.as_str(),
                app.auto_start as i64,
                app.restart_policy.as_str(),
                rows::json_to_sql(&app.resources)?,
                rows::ts_to_sql(app.created_at),
                rows::ts_to_sql(app.updated_at),
            ],
        )?;

        tx.execute(
            "INSERT INTO runtime_state (app_id, current_state) VALUES (?1, ?2)",
            rusqlite::params![app.id.as_str(), app.status.as_str()],
        )?;
        tx.execute(
            "INSERT INTO log_cursors (app_id, next_seq) VALUES (?1, 1)",
            [app.id.as_str()],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_application(&self, id: &AppId) -> Result<Application, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM applications WHERE id = ?1", rows::APP_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows_iter = stmt.query([id.as_str()])?;
        match rows_iter.next()? {
            Some(row) => rows::application_from_row(row),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Atomic partial update; bumps `updated_at`.
    pub fn update_application(
        &self,
        id: &AppId,
        patch: &sdv_core::ApplicationPatch,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut app = {
            let sql = format!("SELECT {} FROM applications WHERE id = ?1", rows::APP_COLUMNS);
            let mut stmt = tx.prepare(&sql)?;
            let mut rows_iter = stmt.query([id.as_str()])?;
            match rows_iter.next()? {
                Some(row) => rows::application_from_row(row)?,
                None => return Err(StoreError::NotFound(id.to_string())),
            }
        };

        apply_patch(&mut app, patch);
        app.updated_at = now;

        tx.execute(
            "UPDATE applications SET name = ?2, description = ?3, version = ?4, code = ?5, \
             entry_point = ?6, binary_path = ?7, working_dir = ?8, args = ?9, env = ?10, \
             python_deps = ?11, vehicle_signals = ?12, data_path = ?13, config = ?14, \
             status = ?15, auto_start = ?16, restart_policy = ?17, resources = ?18, \
             updated_at = ?19 WHERE id = ?1",
            rusqlite::params![
                id.as_str(),
                app.name,
                app.description,
                app.version,
                app.code,
                app.entry_point,
                app.binary_path,
                app.working_dir,
                rows::json_to_sql(&app.args)?,
                rows::json_to_sql(&app.env)?,
                rows::json_to_sql(&app.python_deps)?,
                rows::json_to_sql(&app.vehicle_signals)?,
                app.data_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                rows::json_to_sql(&app.config)?,
                app.status.as_str(),
                app.auto_start as i64,
                app.restart_policy.as_str(),
                rows::json_to_sql(&app.resources)?,
                rows::ts_to_sql(app.updated_at),
            ],
        )?;

        // Keep runtime_state.current_state in step when the patch moves status.
        if let Some(status) = patch.status {
            tx.execute(
                "UPDATE runtime_state SET current_state = ?2 WHERE app_id = ?1",
                rusqlite::params![id.as_str(), status.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(app)
    }

    /// Delete an application; cascades to runtime state, logs, dependencies,
    /// and deploy history.
    pub fn delete_application(&self, id: &AppId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM applications WHERE id = ?1", [id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn list_applications(&self, filter: &AppFilter) -> Result<Vec<Application>, StoreError> {
        let conn = self.conn.lock();
        let mut sql = format!("SELECT {} FROM applications WHERE 1=1", rows::APP_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(app_type) = filter.app_type {
            sql.push_str(" AND app_type = ?");
            params.push(Box::new(app_type.as_str().to_string()));
        }
        if let Some(pattern) = &filter.name_like {
            sql.push_str(" AND name LIKE ?");
            params.push(Box::new(pattern.clone()));
        }
        sql.push_str(" ORDER BY created_at, id");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut rows_iter = stmt.query(param_refs.as_slice())?;
        let mut apps = Vec::new();
        while let Some(row) = rows_iter.next()? {
            apps.push(rows::application_from_row(row)?);
        }
        Ok(apps)
    }

    /// Record a dependency for precheck reporting. Replaces an existing row
    /// with the same (app, kind, name).
    pub fn record_dependency(&self, dep: &Dependency) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO dependencies \
             (app_id, kind, name, version_spec, resolved_version) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                dep.app_id.as_str(),
                dep.kind.as_str(),
                dep.name,
                dep.version_spec,
                dep.resolved_version,
            ],
        )?;
        Ok(())
    }

    pub fn list_dependencies(&self, app_id: &AppId) -> Result<Vec<Dependency>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT app_id, kind, name, version_spec, resolved_version \
             FROM dependencies WHERE app_id = ?1 ORDER BY kind, name",
        )?;
        let mut rows_iter = stmt.query([app_id.as_str()])?;
        let mut deps = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let app_id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            deps.push(Dependency {
                app_id: rows::app_id_from_sql(&app_id)?,
                kind: kind.parse().map_err(StoreError::Corrupt)?,
                name: row.get(2)?,
                version_spec: row.get(3)?,
                resolved_version: row.get(4)?,
            });
        }
        Ok(deps)
    }

    /// Append a deploy-history entry.
    pub fn record_deploy(
        &self,
        app_id: &AppId,
        execution_id: Option<&ExecutionId>,
        action: &str,
        detail: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO deploy_history (app_id, execution_id, action, detail, at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                app_id.as_str(),
                execution_id.map(|e| e.as_str().to_string()),
                action,
                detail,
                rows::ts_to_sql(at),
            ],
        )?;
        Ok(())
    }

    pub fn list_deploy_history(
        &self,
        app_id: &AppId,
        limit: usize,
    ) -> Result<Vec<DeployRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT app_id, execution_id, action, detail, at FROM deploy_history \
             WHERE app_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows_iter = stmt.query(rusqlite::params![app_id.as_str(), limit as i64])?;
        let mut records = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let app_id: String = row.get(0)?;
            let execution_id: Option<String> = row.get(1)?;
            let at: String = row.get(4)?;
            records.push(DeployRecord {
                app_id: rows::app_id_from_sql(&app_id)?,
                execution_id: execution_id.map(ExecutionId::from_string),
                action: row.get(2)?,
                detail: row.get(3)?,
                at: rows::ts_from_sql(&at)?,
            });
        }
        Ok(records)
    }
}

fn apply_patch(app: &mut Application, patch: &sdv_core::ApplicationPatch) {
    if let Some(v) = &patch.name {
        app.name = v.clone();
    }
    if let Some(v) = &patch.description {
        app.description = Some(v.clone());
    }
    if let Some(v) = &patch.version {
        app.version = Some(v.clone());
    }
    if let Some(v) = &patch.code {
        app.code = Some(v.clone());
    }
    if let Some(v) = &patch.entry_point {
        app.entry_point = Some(v.clone());
    }
    if let Some(v) = &patch.binary_path {
        app.binary_path = Some(v.clone());
    }
    if let Some(v) = &patch.working_dir {
        app.working_dir = Some(v.clone());
    }
    if let Some(v) = &patch.args {
        app.args = v.clone();
    }
    if let Some(v) = &patch.env {
        app.env = v.clone();
    }
    if let Some(v) = &patch.python_deps {
        app.python_deps = v.clone();
    }
    if let Some(v) = &patch.vehicle_signals {
        app.vehicle_signals = v.clone();
    }
    if let Some(v) = &patch.data_path {
        app.data_path = v.clone();
    }
    if let Some(v) = &patch.config {
        app.config = v.clone();
    }
    if let Some(v) = patch.status {
        app.status = v;
    }
    if let Some(v) = patch.auto_start {
        app.auto_start = v;
    }
    if let Some(v) = patch.restart_policy {
        app.restart_policy = v;
    }
    if let Some(v) = patch.resources {
        app.resources = v;
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
pub(crate) mod tests;
