// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured-log heuristic.
//!
//! A line that parses as a JSON object with a known message field keeps that
//! message as its content; a parsable `timestamp` field overrides the
//! receive time. Anything else is stored verbatim.

use chrono::{DateTime, TimeZone, Utc};

/// Message fields honored, in priority order.
const MESSAGE_KEYS: &[&str] = &["msg", "message", "text"];

/// Returns `(timestamp override, content)` when the heuristic applies.
pub(crate) fn json_override(line: &str) -> Option<(Option<DateTime<Utc>>, String)> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let obj = value.as_object()?;

    let content = MESSAGE_KEYS
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(|v| v.as_str())?
        .to_string();

    let timestamp = obj.get("timestamp").and_then(parse_timestamp);
    Some((timestamp, content))
}

/// Accepts RFC 3339 strings, epoch seconds, and epoch milliseconds.
fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    if let Some(text) = value.as_str() {
        return DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc));
    }
    if let Some(n) = value.as_f64() {
        // Heuristic: epoch ms are > 10^12, epoch seconds are not.
        let (secs, nanos) = if n > 1e12 {
            let secs = (n / 1000.0).floor();
            (secs as i64, ((n - secs * 1000.0) * 1e6) as u32)
        } else {
            let secs = n.floor();
            (secs as i64, ((n - secs) * 1e9) as u32)
        };
        return Utc.timestamp_opt(secs, nanos).single();
    }
    None
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
