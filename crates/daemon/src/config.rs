// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration.
//!
//! Resolution order for every knob: CLI flag, then environment variable,
//! then built-in default. Configuration errors exit with code 2.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

/// Default local channel port.
pub const DEFAULT_PORT: u16 = 3090;
/// Default vehicle signal broker endpoint.
pub const DEFAULT_BROKER_URL: &str = "ws://127.0.0.1:8090";

/// Configuration errors (exit code 2).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}: {reason}")]
    Invalid { name: &'static str, value: String, reason: String },

    #[error("could not determine a data directory; pass --data-path or set DATA_DIR")]
    NoDataDir,
}

/// Edge runtime for software-defined-vehicle applications.
#[derive(Debug, Parser)]
#[command(name = "sdvd", version, about)]
pub struct Cli {
    /// Port for the local message channel
    #[arg(long)]
    pub port: Option<u16>,

    /// WebSocket URL of the remote hub
    #[arg(long)]
    pub hub_url: Option<String>,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Do not connect to the remote hub
    #[arg(long)]
    pub skip_hub: bool,

    /// Stable identifier announced to the hub
    #[arg(long)]
    pub runtime_id: Option<String>,

    /// Storage root directory
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// None when the hub is skipped.
    pub hub_url: Option<String>,
    pub log_level: String,
    pub runtime_id: String,
    pub data_dir: PathBuf,
    pub broker_url: String,
}

impl Config {
    /// Resolve from parsed CLI flags plus the process environment.
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let port = match cli.port {
            Some(port) => port,
            None => match std::env::var("PORT") {
                Ok(value) => value.parse().map_err(|e| ConfigError::Invalid {
                    name: "PORT",
                    value,
                    reason: format!("{e}"),
                })?,
                Err(_) => DEFAULT_PORT,
            },
        };

        let skip_hub = cli.skip_hub
            || std::env::var("SKIP_HUB")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);
        let hub_url = if skip_hub {
            None
        } else {
            cli.hub_url.or_else(|| std::env::var("HUB_URL").ok()).filter(|u| !u.is_empty())
        };
        if let Some(url) = &hub_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::Invalid {
                    name: "HUB_URL",
                    value: url.clone(),
                    reason: "expected a ws:// or wss:// URL".to_string(),
                });
            }
        }

        let log_level = cli
            .log_level
            .or_else(|| std::env::var("LOG_LEVEL").ok())
            .unwrap_or_else(|| "info".to_string());

        let data_dir = match cli.data_path.or_else(|| std::env::var("DATA_DIR").ok().map(Into::into))
        {
            Some(dir) => dir,
            None => dirs::data_local_dir()
                .map(|base| base.join("vehicle-edge"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let runtime_id = match cli.runtime_id.or_else(|| std::env::var("RUNTIME_ID").ok()) {
            Some(id) if !id.is_empty() => id,
            _ => load_or_mint_runtime_id(&data_dir),
        };

        let broker_url =
            std::env::var("BROKER_URL").ok().unwrap_or_else(|| DEFAULT_BROKER_URL.to_string());

        Ok(Self { port, hub_url, log_level, runtime_id, data_dir, broker_url })
    }
}

/// The runtime id must survive restarts so the hub can re-route to the same
/// kit; it is minted once and kept next to the store.
fn load_or_mint_runtime_id(data_dir: &std::path::Path) -> String {
    let path = data_dir.join("runtime.id");
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let minted = format!("kit-{}", nanoid::nanoid!(12));
    if std::fs::create_dir_all(data_dir).is_ok() {
        if let Err(e) = std::fs::write(&path, &minted) {
            tracing::warn!(error = %e, "could not persist runtime id");
        }
    }
    minted
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
