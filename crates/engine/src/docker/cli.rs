// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verbatim `docker <tokens>` passthrough.
//!
//! Used for `container`-type applications whose full command line comes from
//! the deploying client. The tokens are forwarded untouched; the only
//! interpretation is capturing the container id a run-style invocation
//! prints.

use crate::docker::{CliOutput, EngineError};

/// Run the docker CLI with the given tokens.
pub(crate) async fn run_docker(tokens: &[String]) -> Result<CliOutput, EngineError> {
    let output = tokio::process::Command::new("docker")
        .args(tokens)
        .output()
        .await
        .map_err(|e| EngineError::Unavailable(format!("failed to exec docker: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit_code = output.status.code().unwrap_or(-1) as i64;

    if !output.status.success() {
        return Err(EngineError::Rejected(format!(
            "docker {} failed (exit {}): {}",
            tokens.first().map(String::as_str).unwrap_or(""),
            exit_code,
            stderr,
        )));
    }

    let container_id = parse_container_id(tokens, &stdout);
    Ok(CliOutput { stdout, stderr, exit_code, container_id })
}

/// Capture the printed container id for run-style invocations.
///
/// `docker run -d`/`docker create` print the 64-hex container id as the last
/// line of stdout. Any other command leaves the handle unset.
pub(crate) fn parse_container_id(tokens: &[String], stdout: &str) -> Option<String> {
    let verb = tokens.iter().find(|t| !t.starts_with('-'))?;
    if verb != "run" && verb != "create" {
        return None;
    }
    let last = stdout.lines().last()?.trim();
    let looks_like_id =
        last.len() == 64 && last.bytes().all(|b| b.is_ascii_hexdigit());
    looks_like_id.then(|| last.to_string())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
