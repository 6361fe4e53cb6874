// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema migrations, versioned through `PRAGMA user_version`.

use rusqlite::Connection;

use crate::StoreError;

/// Migrations indexed by target version. Each entry runs in its own
/// transaction; `user_version` is bumped after it commits.
const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    "
    CREATE TABLE applications (
        id              TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        description     TEXT,
        version         TEXT,
        app_type        TEXT NOT NULL,
        code            TEXT,
        entry_point     TEXT,
        binary_path     TEXT,
        working_dir     TEXT,
        args            TEXT NOT NULL DEFAULT '[]',
        env             TEXT NOT NULL DEFAULT '{}',
        python_deps     TEXT NOT NULL DEFAULT '[]',
        vehicle_signals TEXT NOT NULL DEFAULT '[]',
        data_path       TEXT,
        config          TEXT NOT NULL DEFAULT '{}',
        status          TEXT NOT NULL,
        auto_start      INTEGER NOT NULL DEFAULT 0,
        restart_policy  TEXT NOT NULL DEFAULT 'never',
        resources       TEXT NOT NULL DEFAULT '{}',
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    );

    CREATE TABLE runtime_state (
        app_id             TEXT PRIMARY KEY
                           REFERENCES applications(id) ON DELETE CASCADE,
        execution_id       TEXT,
        container_id       TEXT,
        pid                INTEGER,
        last_start         TEXT,
        last_exit          TEXT,
        exit_code          INTEGER,
        total_runtime_secs INTEGER NOT NULL DEFAULT 0,
        current_state      TEXT NOT NULL,
        last_heartbeat     TEXT,
        resources          TEXT
    );

    CREATE TABLE log_lines (
        app_id    TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
        seq       INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        stream    TEXT NOT NULL,
        content   TEXT NOT NULL,
        PRIMARY KEY (app_id, seq)
    );

    CREATE TABLE log_cursors (
        app_id   TEXT PRIMARY KEY REFERENCES applications(id) ON DELETE CASCADE,
        next_seq INTEGER NOT NULL
    );

    CREATE TABLE dependencies (
        app_id           TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
        kind             TEXT NOT NULL,
        name             TEXT NOT NULL,
        version_spec     TEXT,
        resolved_version TEXT,
        PRIMARY KEY (app_id, kind, name)
    );

    CREATE TABLE deploy_history (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id       TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
        execution_id TEXT,
        action       TEXT NOT NULL,
        detail       TEXT,
        at           TEXT NOT NULL
    );

    CREATE INDEX idx_log_lines_stream ON log_lines(app_id, stream, seq);
    CREATE INDEX idx_deploy_history_app ON deploy_history(app_id, id);
    ",
];

/// Apply pending migrations and set required pragmas.
pub(crate) fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (index, sql) in MIGRATIONS.iter().enumerate() {
        let target = index as i64 + 1;
        if target <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
        tracing::info!(version = target, "applied store migration");
    }

    Ok(())
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
