// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log line records produced by the log hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AppId;

/// Maximum stored content per log line. Longer lines are truncated at a
/// UTF-8 boundary.
pub const MAX_LOG_CONTENT_BYTES: usize = 64 * 1024;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStreamKind {
    Stdout,
    Stderr,
    /// Lines produced by the runtime itself (errors, drop sentinels).
    System,
}

impl LogStreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStreamKind::Stdout => "stdout",
            LogStreamKind::Stderr => "stderr",
            LogStreamKind::System => "system",
        }
    }
}

impl std::str::FromStr for LogStreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogStreamKind::Stdout),
            "stderr" => Ok(LogStreamKind::Stderr),
            "system" => Ok(LogStreamKind::System),
            other => Err(format!("unknown log stream: {other}")),
        }
    }
}

/// One captured log line. `seq` is strictly monotone per application and is
/// never reused, even after pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub app_id: AppId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stream: LogStreamKind,
    pub content: String,
}

/// Truncate `content` to [`MAX_LOG_CONTENT_BYTES`] on a char boundary.
pub fn clamp_log_content(content: &str) -> &str {
    if content.len() <= MAX_LOG_CONTENT_BYTES {
        return content;
    }
    let mut end = MAX_LOG_CONTENT_BYTES;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
