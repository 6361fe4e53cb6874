// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sdvd` — the vehicle edge runtime daemon.
//!
//! Exit codes: 0 normal, 1 fatal init failure, 2 configuration error,
//! 130 SIGINT, 143 SIGTERM.

use clap::Parser;
use sdv_daemon::config::{Cli, Config};
use sdv_daemon::Runtime;
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_INIT_FAILURE: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_SIGINT: i32 = 130;
const EXIT_SIGTERM: i32 = 143;

fn main() {
    let cli = Cli::parse();
    let config = match Config::resolve(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            std::process::exit(EXIT_INIT_FAILURE);
        }
    };

    let code = runtime.block_on(run(config));
    // Give spawned tasks a moment to observe cancellation before teardown.
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    std::process::exit(code);
}

async fn run(config: Config) -> i32 {
    let _log_guard = init_logging(&config);

    let mut runtime = match Runtime::boot(config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "initialization failed");
            eprintln!("initialization failed: {e}");
            return EXIT_INIT_FAILURE;
        }
    };

    let cancel = runtime.cancel_token();
    let signal_code = tokio::spawn(wait_for_signal(cancel));

    runtime.run().await;
    runtime.shutdown().await;

    match signal_code.await {
        Ok(Some(code)) => code,
        _ => EXIT_OK,
    }
}

/// Resolve on SIGINT/SIGTERM, cancelling the runtime and reporting the
/// conventional exit code.
async fn wait_for_signal(cancel: tokio_util::sync::CancellationToken) -> Option<i32> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "signal handler install failed");
                cancel.cancelled().await;
                return None;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT");
                cancel.cancel();
                Some(EXIT_SIGINT)
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM");
                cancel.cancel();
                Some(EXIT_SIGTERM)
            }
            _ = cancel.cancelled() => None,
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                Some(EXIT_SIGINT)
            }
            _ = cancel.cancelled() => None,
        }
    }
}

/// Stderr plus a non-blocking file appender under the data dir.
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = config.data_dir.clone();
    let guard = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(&log_dir, "runtime.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            None
        }
    };
    guard
}
