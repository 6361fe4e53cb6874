// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log line persistence with strictly monotone per-app sequences.
//!
//! Sequences come from `log_cursors`, not `MAX(seq)+1`, so pruning can
//! delete old rows without ever reusing a number.

use chrono::{DateTime, Utc};
use sdv_core::{AppId, LogLine, LogStreamKind};

use crate::rows;
use crate::{Store, StoreError};

/// Options for [`Store::read_logs`].
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Only lines with `seq > since_seq`.
    pub since_seq: Option<u64>,
    /// Newest-N cap; the returned order is still ascending.
    pub limit: Option<usize>,
    pub stream: Option<LogStreamKind>,
}

impl Store {
    /// Append one line, returning its sequence number.
    pub fn append_log(
        &self,
        app_id: &AppId,
        stream: LogStreamKind,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let content = sdv_core::clamp_log_content(content);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let seq: i64 = tx
            .query_row(
                "SELECT next_seq FROM log_cursors WHERE app_id = ?1",
                [app_id.as_str()],
                |row| row.get(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Err(StoreError::NotFound(app_id.to_string()))
                }
                other => Err(StoreError::Sqlite(other)),
            })?;

        tx.execute(
            "INSERT INTO log_lines (app_id, seq, timestamp, stream, content) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                app_id.as_str(),
                seq,
                rows::ts_to_sql(timestamp),
                stream.as_str(),
                content,
            ],
        )?;
        tx.execute(
            "UPDATE log_cursors SET next_seq = ?2 WHERE app_id = ?1",
            rusqlite::params![app_id.as_str(), seq + 1],
        )?;

        tx.commit()?;
        Ok(seq.max(0) as u64)
    }

    /// The sequence the next appended line will receive.
    pub fn next_log_seq(&self, app_id: &AppId) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let seq: i64 = conn
            .query_row(
                "SELECT next_seq FROM log_cursors WHERE app_id = ?1",
                [app_id.as_str()],
                |row| row.get(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Err(StoreError::NotFound(app_id.to_string()))
                }
                other => Err(StoreError::Sqlite(other)),
            })?;
        Ok(seq.max(1) as u64)
    }

    /// Write pre-sequenced lines in one transaction (log hub coalescing).
    ///
    /// Lines whose application disappeared since they were queued are
    /// silently skipped. Cursors advance to one past the highest written
    /// sequence.
    pub fn append_log_batch(&self, lines: &[LogLine]) -> Result<usize, StoreError> {
        if lines.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0usize;

        for line in lines {
            let known: bool = tx
                .query_row(
                    "SELECT 1 FROM log_cursors WHERE app_id = ?1",
                    [line.app_id.as_str()],
                    |_| Ok(()),
                )
                .map(|_| true)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(false),
                    other => Err(other),
                })?;
            if !known {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO log_lines (app_id, seq, timestamp, stream, content) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    line.app_id.as_str(),
                    line.seq as i64,
                    rows::ts_to_sql(line.timestamp),
                    line.stream.as_str(),
                    sdv_core::clamp_log_content(&line.content),
                ],
            )?;
            tx.execute(
                "UPDATE log_cursors SET next_seq = MAX(next_seq, ?2) WHERE app_id = ?1",
                rusqlite::params![line.app_id.as_str(), line.seq as i64 + 1],
            )?;
            written += 1;
        }

        tx.commit()?;
        Ok(written)
    }

    /// Read lines in ascending sequence order.
    pub fn read_logs(&self, app_id: &AppId, query: &LogQuery) -> Result<Vec<LogLine>, StoreError> {
        let conn = self.conn.lock();
        let mut sql = String::from(
            "SELECT app_id, seq, timestamp, stream, content FROM log_lines WHERE app_id = ?",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(app_id.as_str().to_string())];

        if let Some(since) = query.since_seq {
            sql.push_str(" AND seq > ?");
            params.push(Box::new(since as i64));
        }
        if let Some(stream) = query.stream {
            sql.push_str(" AND stream = ?");
            params.push(Box::new(stream.as_str().to_string()));
        }
        // Newest-N: take descending then reverse, so `limit` means "the most
        // recent lines" like every log viewer expects.
        sql.push_str(" ORDER BY seq DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut rows_iter = stmt.query(param_refs.as_slice())?;
        let mut lines = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let app_id: String = row.get(0)?;
            let seq: i64 = row.get(1)?;
            let timestamp: String = row.get(2)?;
            let stream: String = row.get(3)?;
            lines.push(LogLine {
                app_id: rows::app_id_from_sql(&app_id)?,
                seq: seq.max(0) as u64,
                timestamp: rows::ts_from_sql(&timestamp)?,
                stream: stream.parse().map_err(StoreError::Corrupt)?,
                content: row.get(4)?,
            });
        }
        lines.reverse();
        Ok(lines)
    }

    /// Drop oldest lines beyond `keep_lines` or `keep_bytes` of content.
    /// Sequence numbers of surviving lines are untouched.
    pub fn prune_logs(
        &self,
        app_id: &AppId,
        keep_lines: usize,
        keep_bytes: u64,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        // Walk newest-first accumulating bytes; everything past either cap
        // goes.
        let cutoff: Option<i64> = {
            let mut stmt = tx.prepare(
                "SELECT seq, LENGTH(content) FROM log_lines WHERE app_id = ?1 \
                 ORDER BY seq DESC",
            )?;
            let mut rows_iter = stmt.query([app_id.as_str()])?;
            let mut kept = 0usize;
            let mut bytes = 0u64;
            let mut cutoff = None;
            while let Some(row) = rows_iter.next()? {
                let seq: i64 = row.get(0)?;
                let len: i64 = row.get(1)?;
                kept += 1;
                bytes = bytes.saturating_add(len.max(0) as u64);
                if kept > keep_lines || bytes > keep_bytes {
                    cutoff = Some(seq);
                    break;
                }
            }
            cutoff
        };

        let deleted = match cutoff {
            Some(seq) => tx.execute(
                "DELETE FROM log_lines WHERE app_id = ?1 AND seq <= ?2",
                rusqlite::params![app_id.as_str(), seq],
            )?,
            None => 0,
        };

        tx.commit()?;
        Ok(deleted)
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
