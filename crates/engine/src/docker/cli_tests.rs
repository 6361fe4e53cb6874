// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn tokens(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn run_style_captures_printed_id() {
    let id = "a".repeat(64);
    let parsed = parse_container_id(&tokens(&["run", "-d", "nginx:alpine"]), &id);
    assert_eq!(parsed.as_deref(), Some(id.as_str()));
}

#[test]
fn run_with_leading_flags_still_detected() {
    let id = "0123456789abcdef".repeat(4);
    let parsed = parse_container_id(&tokens(&["--context", "run"]), &id);
    // "--context" is skipped; first bare token decides
    assert_eq!(parsed.as_deref(), Some(id.as_str()));
}

#[test]
fn id_taken_from_last_line() {
    let id = "b".repeat(64);
    let stdout = format!("Unable to find image locally\nPulling from library\n{id}");
    let parsed = parse_container_id(&tokens(&["run", "-d", "nginx"]), &stdout);
    assert_eq!(parsed.as_deref(), Some(id.as_str()));
}

#[parameterized(
    ps = { &["ps", "-a"] },
    logs = { &["logs", "some-container"] },
    volume = { &["volume", "create", "x"] },
)]
fn non_run_commands_leave_handle_unset(parts: &[&str]) {
    let id = "c".repeat(64);
    assert_eq!(parse_container_id(&tokens(parts), &id), None);
}

#[test]
fn non_id_output_is_ignored() {
    assert_eq!(parse_container_id(&tokens(&["run"]), "abc123"), None);
    assert_eq!(parse_container_id(&tokens(&["run"]), "done"), None);
    // right length, wrong alphabet
    assert_eq!(parse_container_id(&tokens(&["run"]), &"z".repeat(64)), None);
}

#[test]
fn empty_output_is_ignored() {
    assert_eq!(parse_container_id(&tokens(&["run", "-d", "nginx"]), ""), None);
}
