// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn short_content_untouched() {
    assert_eq!(clamp_log_content("hello"), "hello");
}

#[test]
fn long_content_truncated_at_cap() {
    let content = "x".repeat(MAX_LOG_CONTENT_BYTES + 100);
    let clamped = clamp_log_content(&content);
    assert_eq!(clamped.len(), MAX_LOG_CONTENT_BYTES);
}

#[test]
fn truncation_respects_char_boundary() {
    // Multi-byte char straddling the cap must not be split
    let mut content = "a".repeat(MAX_LOG_CONTENT_BYTES - 1);
    content.push('é'); // 2 bytes, crosses the boundary
    content.push_str("tail");
    let clamped = clamp_log_content(&content);
    assert!(clamped.len() <= MAX_LOG_CONTENT_BYTES);
    assert!(clamped.chars().all(|c| c == 'a'));
}

#[test]
fn stream_kind_round_trips() {
    for s in ["stdout", "stderr", "system"] {
        let kind: LogStreamKind = s.parse().unwrap();
        assert_eq!(kind.as_str(), s);
    }
    assert!("other".parse::<LogStreamKind>().is_err());
}
