// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container log tail task.
//!
//! One task per attached container. The engine stream can die on engine
//! restarts; while the container is still running the tail reconnects with
//! exponential backoff, asking only for new lines so nothing is replayed.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sdv_core::AppId;
use tokio_util::sync::CancellationToken;

use crate::docker::ContainerEngine;
use crate::loghub::LogHub;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub(crate) async fn run_tail(
    hub: LogHub,
    app_id: AppId,
    container_id: String,
    engine: Arc<dyn ContainerEngine>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut first_connect = true;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // First connect reads from the beginning (the container was just
        // created); reconnects only follow new output.
        let tail = if first_connect { None } else { Some(0) };
        match engine.logs(&container_id, true, tail).await {
            Ok(mut stream) => {
                first_connect = false;
                backoff = INITIAL_BACKOFF;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        chunk = stream.next() => match chunk {
                            Some(Ok(chunk)) => {
                                hub.publish(&app_id, chunk.stream, &chunk.bytes);
                            }
                            Some(Err(e)) => {
                                tracing::warn!(%app_id, error = %e, "log stream error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%app_id, error = %e, "log tail connect failed");
            }
        }

        // Stream ended. Still running means the engine dropped us; retry.
        let keep_going = match engine.inspect(&container_id).await {
            Ok(state) => state.running,
            Err(_) => false,
        };
        if !keep_going {
            tracing::debug!(%app_id, container = %container_id, "log tail finished");
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
