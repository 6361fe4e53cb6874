// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-state persistence.
//!
//! `runtime_state` is the source of truth for lifecycle transitions;
//! `applications.status` mirrors it and both are written inside one
//! transaction so observers only ever read a consistent pair.

use sdv_core::{AppId, RuntimeState, RuntimeStatePatch};

use crate::rows;
use crate::{Store, StoreError};

impl Store {
    pub fn get_runtime_state(&self, app_id: &AppId) -> Result<RuntimeState, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM runtime_state WHERE app_id = ?1", rows::STATE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows_iter = stmt.query([app_id.as_str()])?;
        match rows_iter.next()? {
            Some(row) => rows::runtime_state_from_row(row),
            None => Err(StoreError::NotFound(app_id.to_string())),
        }
    }

    /// Apply a partial update to an application's runtime state.
    ///
    /// The row is created if missing (it normally exists from install).
    /// When `patch.current_state` is set, `applications.status` is updated in
    /// the same transaction.
    pub fn upsert_runtime_state(
        &self,
        app_id: &AppId,
        patch: &RuntimeStatePatch,
    ) -> Result<RuntimeState, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        // The FK constraint rejects states for unknown applications.
        let app_exists: bool = tx
            .query_row("SELECT 1 FROM applications WHERE id = ?1", [app_id.as_str()], |_| Ok(()))
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })?;
        if !app_exists {
            return Err(StoreError::NotFound(app_id.to_string()));
        }

        let mut state = {
            let sql =
                format!("SELECT {} FROM runtime_state WHERE app_id = ?1", rows::STATE_COLUMNS);
            let mut stmt = tx.prepare(&sql)?;
            let mut rows_iter = stmt.query([app_id.as_str()])?;
            match rows_iter.next()? {
                Some(row) => rows::runtime_state_from_row(row)?,
                None => RuntimeState::installed(app_id.clone()),
            }
        };

        if let Some(v) = &patch.execution_id {
            state.execution_id = v.clone();
        }
        if let Some(v) = &patch.container_id {
            state.container_id = v.clone();
        }
        if let Some(v) = patch.pid {
            state.pid = v;
        }
        if let Some(v) = patch.last_start {
            state.last_start = Some(v);
        }
        if let Some(v) = patch.last_exit {
            state.last_exit = Some(v);
        }
        if let Some(v) = patch.exit_code {
            state.exit_code = v;
        }
        if let Some(secs) = patch.add_runtime_secs {
            state.total_runtime_secs = state.total_runtime_secs.saturating_add(secs);
        }
        if let Some(v) = patch.current_state {
            state.current_state = v;
        }
        if let Some(v) = patch.last_heartbeat {
            state.last_heartbeat = Some(v);
        }
        if let Some(v) = &patch.resources {
            state.resources = Some(v.clone());
        }

        tx.execute(
            "INSERT OR REPLACE INTO runtime_state (app_id, execution_id, container_id, pid, \
             last_start, last_exit, exit_code, total_runtime_secs, current_state, \
             last_heartbeat, resources) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                app_id.as_str(),
                state.execution_id.as_ref().map(|e| e.as_str().to_string()),
                state.container_id,
                state.pid,
                state.last_start.map(rows::ts_to_sql),
                state.last_exit.map(rows::ts_to_sql),
                state.exit_code,
                state.total_runtime_secs as i64,
                state.current_state.as_str(),
                state.last_heartbeat.map(rows::ts_to_sql),
                state
                    .resources
                    .as_ref()
                    .map(rows::json_to_sql)
                    .transpose()?,
            ],
        )?;

        if let Some(status) = patch.current_state {
            tx.execute(
                "UPDATE applications SET status = ?2 WHERE id = ?1",
                rusqlite::params![app_id.as_str(), status.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(state)
    }

    /// All runtime states, for boot reconciliation.
    pub fn list_runtime_states(&self) -> Result<Vec<RuntimeState>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM runtime_state ORDER BY app_id", rows::STATE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows_iter = stmt.query([])?;
        let mut states = Vec::new();
        while let Some(row) = rows_iter.next()? {
            states.push(rows::runtime_state_from_row(row)?);
        }
        Ok(states)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
