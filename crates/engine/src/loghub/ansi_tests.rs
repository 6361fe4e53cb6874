// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn plain_input_borrows() {
    let input = b"no escapes here";
    assert!(matches!(strip_ansi(input), Cow::Borrowed(_)));
}

#[test]
fn color_codes_removed() {
    let input = b"\x1b[32mgreen\x1b[0m plain";
    assert_eq!(strip_ansi(input).as_ref(), b"green plain");
}

#[test]
fn tracing_style_line() {
    let input =
        b"\x1b[2m2026-07-01T10:00:00Z\x1b[0m \x1b[32m INFO\x1b[0m \x1b[2mapp\x1b[0m ready";
    assert_eq!(strip_ansi(input).as_ref(), b"2026-07-01T10:00:00Z  INFO app ready");
}

#[test]
fn osc_hyperlink_removed() {
    let input = b"\x1b]8;;https://example.com\x07link\x1b]8;;\x07";
    assert_eq!(strip_ansi(input).as_ref(), b"link");
}

#[test]
fn osc_with_string_terminator() {
    let input = b"\x1b]0;title\x1b\\body";
    assert_eq!(strip_ansi(input).as_ref(), b"body");
}

#[test]
fn fe_sequence_removed() {
    let input = b"a\x1bNb";
    assert_eq!(strip_ansi(input).as_ref(), b"ab");
}

#[test]
fn trailing_incomplete_sequence_dropped() {
    assert_eq!(strip_ansi(b"text\x1b").as_ref(), b"text");
    assert_eq!(strip_ansi(b"text\x1b[31").as_ref(), b"text");
}

#[test]
fn only_escapes_yields_empty() {
    assert_eq!(strip_ansi(b"\x1b[0m\x1b[1m\x1b[32m").as_ref(), b"");
}

#[test]
fn json_payload_untouched() {
    let input = b"\x1b[36m{\"msg\":\"ok\"}\x1b[0m";
    assert_eq!(strip_ansi(input).as_ref(), b"{\"msg\":\"ok\"}");
}
