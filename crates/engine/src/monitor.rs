// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic container resource sampling and threshold alarms.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use sdv_core::{AppId, BreachSeverity, Event, ResourceSample, RuntimeStatePatch};
use sdv_storage::Store;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::docker::{ContainerEngine, StatsSnapshot, LABEL_RUNTIME, LABEL_RUNTIME_VALUE};
use crate::paths::StoragePaths;

/// Samples kept per app.
const HISTORY_CAP: usize = 1000;

/// Alarm thresholds.
const CPU_WARN_PERCENT: f64 = 80.0;
const MEMORY_WARN_PERCENT: f64 = 80.0;
const CRITICAL_PERCENT: f64 = 90.0;
const DISK_LIMIT_BYTES: u64 = 1024 * 1024 * 1024;
const NETWORK_LIMIT_BYTES: u64 = 100 * 1024 * 1024;

/// CPU usage percentage from one stats reading.
///
/// `(cpu delta / system delta) * online cpus * 100`, zero on counter resets
/// or missing counters.
pub fn cpu_percent(stats: &StatsSnapshot) -> f64 {
    let cpu_delta = stats.cpu_total_usage.saturating_sub(stats.precpu_total_usage) as f64;
    let system_delta =
        stats.system_cpu_usage.saturating_sub(stats.pre_system_cpu_usage) as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }
    let cpus = stats.online_cpus.max(1) as f64;
    let percent = (cpu_delta / system_delta) * cpus * 100.0;
    if percent.is_finite() {
        percent
    } else {
        0.0
    }
}

/// Convert a raw reading to the persisted sample shape.
pub fn to_sample(stats: &StatsSnapshot) -> ResourceSample {
    let memory_percent = if stats.memory_limit > 0 {
        (stats.memory_usage as f64 / stats.memory_limit as f64) * 100.0
    } else {
        0.0
    };
    ResourceSample {
        cpu_percent: cpu_percent(stats),
        memory_bytes: stats.memory_usage,
        memory_limit_bytes: stats.memory_limit,
        memory_percent,
        net_rx_bytes: stats.net_rx_bytes,
        net_tx_bytes: stats.net_tx_bytes,
        block_read_bytes: stats.block_read_bytes,
        block_write_bytes: stats.block_write_bytes,
        pids: stats.pids,
        sampled_at: Some(Utc::now()),
    }
}

/// Threshold evaluation: `(resource, value, limit, severity)` per breach.
pub fn breaches(sample: &ResourceSample, disk_usage: u64) -> Vec<(String, f64, f64, BreachSeverity)> {
    let mut found = Vec::new();

    if sample.cpu_percent > CPU_WARN_PERCENT {
        let severity = if sample.cpu_percent > CRITICAL_PERCENT {
            BreachSeverity::Critical
        } else {
            BreachSeverity::Warning
        };
        found.push(("cpu".to_string(), sample.cpu_percent, CPU_WARN_PERCENT, severity));
    }
    if sample.memory_percent > MEMORY_WARN_PERCENT {
        let severity = if sample.memory_percent > CRITICAL_PERCENT {
            BreachSeverity::Critical
        } else {
            BreachSeverity::Warning
        };
        found.push((
            "memory".to_string(),
            sample.memory_percent,
            MEMORY_WARN_PERCENT,
            severity,
        ));
    }
    if disk_usage > DISK_LIMIT_BYTES {
        found.push((
            "disk".to_string(),
            disk_usage as f64,
            DISK_LIMIT_BYTES as f64,
            BreachSeverity::Warning,
        ));
    }
    let network_total = sample.net_rx_bytes + sample.net_tx_bytes;
    if network_total > NETWORK_LIMIT_BYTES {
        found.push((
            "network".to_string(),
            network_total as f64,
            NETWORK_LIMIT_BYTES as f64,
            BreachSeverity::Warning,
        ));
    }
    found
}

/// Recursive directory size; used for the per-app disk threshold.
pub(crate) fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else { return 0 };
    let mut total = 0;
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else { continue };
        if metadata.is_dir() {
            total += dir_size(&entry.path());
        } else {
            total += metadata.len();
        }
    }
    total
}

/// The monitor. Owns per-app sample rings.
#[derive(Clone)]
pub struct ResourceMonitor {
    engine: Arc<dyn ContainerEngine>,
    store: Store,
    paths: StoragePaths,
    event_tx: mpsc::Sender<Event>,
    interval: Duration,
    history: Arc<Mutex<HashMap<AppId, VecDeque<ResourceSample>>>>,
}

impl ResourceMonitor {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        store: Store,
        paths: StoragePaths,
        event_tx: mpsc::Sender<Event>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            store,
            paths,
            event_tx,
            interval,
            history: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Recent samples for an app, oldest first.
    pub fn history(&self, app_id: &AppId) -> Vec<ResourceSample> {
        self.history
            .lock()
            .get(app_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// One sampling sweep over every runtime-labeled container.
    pub async fn sample_once(&self) {
        let containers = match self
            .engine
            .list_by_label(LABEL_RUNTIME, LABEL_RUNTIME_VALUE)
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                tracing::debug!(error = %e, "stats sweep skipped, engine unavailable");
                return;
            }
        };

        for container in containers.iter().filter(|c| c.running) {
            let Some(app_id) = container.app_id().and_then(|id| AppId::parse(id).ok()) else {
                continue;
            };
            let stats = match self.engine.stats(&container.id).await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::debug!(%app_id, error = %e, "stats read failed");
                    continue;
                }
            };

            let sample = to_sample(&stats);

            {
                let mut history = self.history.lock();
                let ring = history.entry(app_id.clone()).or_default();
                ring.push_back(sample.clone());
                while ring.len() > HISTORY_CAP {
                    ring.pop_front();
                }
            }

            let patch = RuntimeStatePatch {
                resources: Some(sample.clone()),
                last_heartbeat: Some(Utc::now()),
                ..Default::default()
            };
            if let Err(e) = self.store.upsert_runtime_state(&app_id, &patch) {
                tracing::debug!(%app_id, error = %e, "sample persist failed");
            }

            let disk_usage = dir_size(&self.paths.app_dir(&app_id));
            for (resource, value, limit, severity) in breaches(&sample, disk_usage) {
                tracing::warn!(%app_id, resource, value, "resource threshold breached");
                let _ = self
                    .event_tx
                    .send(Event::ThresholdBreach {
                        app_id: app_id.clone(),
                        resource,
                        value,
                        limit,
                        severity,
                    })
                    .await;
            }
        }
    }

    /// Sampling loop; owned by the runtime root.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sample_once().await,
            }
        }
    }

    /// Forget a removed app's history.
    pub fn forget_app(&self, app_id: &AppId) {
        self.history.lock().remove(app_id);
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
