// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level binary specs.
//!
//! These drive the built `sdvd` binary for the surfaces that do not need a
//! container engine: CLI parsing, configuration errors, and exit codes.

use assert_cmd::Command;

fn sdvd() -> Command {
    let mut cmd = Command::cargo_bin("sdvd").expect("sdvd binary");
    cmd.env_remove("PORT")
        .env_remove("HUB_URL")
        .env_remove("LOG_LEVEL")
        .env_remove("SKIP_HUB")
        .env_remove("RUNTIME_ID")
        .env_remove("DATA_DIR");
    cmd
}

#[test]
fn help_lists_the_documented_flags() {
    let output = sdvd().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    for flag in ["--port", "--hub-url", "--log-level", "--skip-hub", "--runtime-id", "--data-path"]
    {
        assert!(stdout.contains(flag), "missing {flag} in --help output");
    }
}

#[test]
fn version_flag_works() {
    sdvd().arg("--version").assert().success();
}

#[test]
fn bad_port_env_exits_with_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    sdvd()
        .env("PORT", "seventy")
        .args(["--data-path", &dir.path().display().to_string()])
        .assert()
        .code(2);
}

#[test]
fn non_websocket_hub_url_exits_with_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    sdvd()
        .args([
            "--hub-url",
            "http://not-a-websocket",
            "--data-path",
            &dir.path().display().to_string(),
        ])
        .assert()
        .code(2);
}

#[test]
fn unknown_flag_is_a_usage_error() {
    sdvd().arg("--warp-factor=9").assert().failure();
}
