// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-app log capture, bounded buffering, and subscriber fan-out.
//!
//! Raw byte chunks from container log tails are reassembled into lines,
//! cleaned (ANSI strip, JSON field extraction), sequenced, and delivered to:
//! a per-app ring buffer (replay), a rotating file sink, the store (through
//! a coalescing writer task), and every subscriber queue. Subscribers that
//! fall behind lose their *oldest* queued lines and get a sentinel telling
//! them how many.

mod ansi;
mod parse;
mod sink;
mod tail;

pub use ansi::strip_ansi;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sdv_core::{AppId, ClientId, LogLine, LogStreamKind};
use sdv_storage::Store;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::docker::ContainerEngine;

/// Tuning knobs. Defaults match the runtime contract.
#[derive(Debug, Clone)]
pub struct LogHubConfig {
    /// Ring buffer line cap per app.
    pub max_lines: usize,
    /// Ring buffer byte cap per app.
    pub max_bytes: usize,
    /// Lines replayed to a fresh subscriber.
    pub replay_lines: usize,
    /// Per-subscriber queue capacity before drop-oldest kicks in.
    pub subscriber_queue: usize,
    /// Partial lines flush after this much quiet time.
    pub idle_flush: Duration,
    /// File sink rotation threshold.
    pub rotate_bytes: u64,
    /// Rotated sink files older than this are purged at startup.
    pub keep_rotated_days: u64,
    /// Store-side retention caps, enforced by the writer task.
    pub db_max_lines: usize,
    pub db_max_bytes: u64,
}

impl Default for LogHubConfig {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            max_bytes: 1024 * 1024,
            replay_lines: 100,
            subscriber_queue: 256,
            idle_flush: Duration::from_millis(100),
            rotate_bytes: 16 * 1024 * 1024,
            keep_rotated_days: 7,
            db_max_lines: 10_000,
            db_max_bytes: 16 * 1024 * 1024,
        }
    }
}

struct Partial {
    buf: Vec<u8>,
    generation: u64,
}

struct AppLogs {
    next_seq: u64,
    ring: VecDeque<LogLine>,
    ring_bytes: usize,
    stdout_partial: Partial,
    stderr_partial: Partial,
    subscribers: HashMap<ClientId, Arc<SubscriberQueue>>,
    tail_cancel: Option<CancellationToken>,
    sink: sink::FileSink,
}

impl AppLogs {
    fn partial_mut(&mut self, stream: LogStreamKind) -> &mut Partial {
        match stream {
            LogStreamKind::Stderr => &mut self.stderr_partial,
            _ => &mut self.stdout_partial,
        }
    }
}

struct QueueState {
    items: VecDeque<LogLine>,
    dropped: u64,
    first_dropped_seq: u64,
    closed: bool,
}

/// Bounded per-subscriber delivery queue with drop-oldest backpressure.
pub struct SubscriberQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                dropped: 0,
                first_dropped_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn push(&self, line: LogLine) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            if state.items.len() >= self.capacity {
                if let Some(evicted) = state.items.pop_front() {
                    if state.dropped == 0 {
                        state.first_dropped_seq = evicted.seq;
                    }
                    state.dropped += 1;
                }
            }
            state.items.push_back(line);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Result<LogLine, ()>> {
        let mut state = self.state.lock();
        if state.dropped > 0 {
            if let Some(front) = state.items.front() {
                let sentinel = LogLine {
                    app_id: front.app_id.clone(),
                    seq: state.first_dropped_seq,
                    timestamp: Utc::now(),
                    stream: LogStreamKind::System,
                    content: format!("{} lines dropped", state.dropped),
                };
                state.dropped = 0;
                state.first_dropped_seq = 0;
                return Some(Ok(sentinel));
            }
        }
        if let Some(line) = state.items.pop_front() {
            return Some(Ok(line));
        }
        if state.closed {
            return Some(Err(()));
        }
        None
    }
}

/// Handle through which a connection task drains its subscription.
pub struct LogSubscription {
    queue: Arc<SubscriberQueue>,
}

impl LogSubscription {
    /// Next line, in per-app sequence order. Returns `None` once the
    /// subscription has been removed.
    pub async fn recv(&self) -> Option<LogLine> {
        loop {
            match self.queue.pop() {
                Some(Ok(line)) => return Some(line),
                Some(Err(())) => return None,
                None => self.queue.notify.notified().await,
            }
        }
    }
}

struct HubInner {
    config: LogHubConfig,
    store: Store,
    logs_dir: PathBuf,
    apps: Mutex<HashMap<AppId, AppLogs>>,
    writer_tx: mpsc::UnboundedSender<LogLine>,
    writer_cancel: CancellationToken,
    writer_done: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// The hub. Cheap to clone.
#[derive(Clone)]
pub struct LogHub {
    inner: Arc<HubInner>,
}

impl LogHub {
    /// Create the hub and start its store-writer task. Purges stale rotated
    /// sink files.
    pub fn new(store: Store, logs_dir: PathBuf, config: LogHubConfig) -> Self {
        sink::purge_rotated(&logs_dir, config.keep_rotated_days);

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer_cancel = CancellationToken::new();
        let writer = tokio::spawn(run_store_writer(
            store.clone(),
            writer_rx,
            writer_cancel.clone(),
            config.db_max_lines,
            config.db_max_bytes,
        ));

        Self {
            inner: Arc::new(HubInner {
                config,
                store,
                logs_dir,
                apps: Mutex::new(HashMap::new()),
                writer_tx,
                writer_cancel,
                writer_done: Mutex::new(Some(writer)),
            }),
        }
    }

    /// Publish raw bytes from a container stream. Chunks may end mid-line;
    /// the remainder is buffered and flushed on the next newline or after
    /// the idle timeout.
    pub fn publish(&self, app_id: &AppId, stream: LogStreamKind, chunk: &[u8]) {
        let received = Utc::now();
        let mut completed: Vec<Vec<u8>> = Vec::new();
        let mut flush_generation = None;

        {
            let mut apps = self.inner.apps.lock();
            let Some(app) = Self::ensure_app(&self.inner, &mut apps, app_id) else {
                return;
            };
            let partial = app.partial_mut(stream);
            partial.buf.extend_from_slice(chunk);

            while let Some(pos) = partial.buf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = partial.buf.drain(..=pos).collect();
                line.pop(); // trailing newline
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                completed.push(line);
            }

            partial.generation += 1;
            if !partial.buf.is_empty() {
                flush_generation = Some(partial.generation);
            }

            for line in completed {
                self.ingest_line(app, app_id, stream, &line, received);
            }
        }

        if let Some(generation) = flush_generation {
            let hub = self.clone();
            let app_id = app_id.clone();
            let idle = self.inner.config.idle_flush;
            tokio::spawn(async move {
                tokio::time::sleep(idle).await;
                hub.flush_partial_if(&app_id, stream, generation);
            });
        }
    }

    /// Publish a runtime-generated line (`system` stream).
    pub fn publish_system(&self, app_id: &AppId, message: &str) {
        let received = Utc::now();
        let mut apps = self.inner.apps.lock();
        let Some(app) = Self::ensure_app(&self.inner, &mut apps, app_id) else {
            return;
        };
        self.ingest_line(app, app_id, LogStreamKind::System, message.as_bytes(), received);
    }

    /// Flush a stale partial line if no new bytes arrived since `generation`.
    fn flush_partial_if(&self, app_id: &AppId, stream: LogStreamKind, generation: u64) {
        let received = Utc::now();
        let mut apps = self.inner.apps.lock();
        let Some(app) = apps.get_mut(app_id) else { return };
        let partial = app.partial_mut(stream);
        if partial.generation != generation || partial.buf.is_empty() {
            return;
        }
        let line = std::mem::take(&mut partial.buf);
        self.ingest_line(app, app_id, stream, &line, received);
    }

    /// Attach a subscription; the most recent buffered lines are replayed
    /// into it immediately. Returns the handle and the replay count.
    pub fn subscribe(&self, client: &ClientId, app_id: &AppId) -> (LogSubscription, usize) {
        let mut apps = self.inner.apps.lock();
        let queue = Arc::new(SubscriberQueue::new(self.inner.config.subscriber_queue));
        let replayed = match Self::ensure_app(&self.inner, &mut apps, app_id) {
            Some(app) => {
                let skip = app.ring.len().saturating_sub(self.inner.config.replay_lines);
                let mut count = 0;
                for line in app.ring.iter().skip(skip) {
                    queue.push(line.clone());
                    count += 1;
                }
                app.subscribers.insert(client.clone(), Arc::clone(&queue));
                count
            }
            None => 0,
        };
        (LogSubscription { queue }, replayed)
    }

    /// Remove one subscription, or every subscription held by `client` when
    /// `app_id` is `None`. Returns how many were removed.
    pub fn unsubscribe(&self, client: &ClientId, app_id: Option<&AppId>) -> usize {
        let mut apps = self.inner.apps.lock();
        let mut removed = 0;
        match app_id {
            Some(app_id) => {
                if let Some(app) = apps.get_mut(app_id) {
                    if let Some(queue) = app.subscribers.remove(client) {
                        queue.close();
                        removed = 1;
                    }
                }
            }
            None => {
                for app in apps.values_mut() {
                    if let Some(queue) = app.subscribers.remove(client) {
                        queue.close();
                        removed += 1;
                    }
                }
            }
        }
        removed
    }

    /// Start a long-lived tail task for a container. Replaces any existing
    /// tail for the app.
    pub fn attach_container(
        &self,
        app_id: &AppId,
        container_id: &str,
        engine: Arc<dyn ContainerEngine>,
    ) {
        let cancel = CancellationToken::new();
        {
            let mut apps = self.inner.apps.lock();
            let Some(app) = Self::ensure_app(&self.inner, &mut apps, app_id) else {
                return;
            };
            if let Some(previous) = app.tail_cancel.take() {
                previous.cancel();
            }
            app.tail_cancel = Some(cancel.clone());
        }
        tokio::spawn(tail::run_tail(
            self.clone(),
            app_id.clone(),
            container_id.to_string(),
            engine,
            cancel,
        ));
    }

    /// Stop the tail task for an app, if any.
    pub fn detach_container(&self, app_id: &AppId) {
        let mut apps = self.inner.apps.lock();
        if let Some(app) = apps.get_mut(app_id) {
            if let Some(cancel) = app.tail_cancel.take() {
                cancel.cancel();
            }
        }
    }

    /// Drop all in-memory state for a removed app and close its subscribers.
    pub fn forget_app(&self, app_id: &AppId) {
        let mut apps = self.inner.apps.lock();
        if let Some(app) = apps.remove(app_id) {
            if let Some(cancel) = app.tail_cancel {
                cancel.cancel();
            }
            for queue in app.subscribers.values() {
                queue.close();
            }
        }
    }

    /// Stop the writer task after draining queued lines.
    pub async fn shutdown(&self) {
        self.inner.writer_cancel.cancel();
        let handle = self.inner.writer_done.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn ensure_app<'a>(
        inner: &HubInner,
        apps: &'a mut HashMap<AppId, AppLogs>,
        app_id: &AppId,
    ) -> Option<&'a mut AppLogs> {
        if !apps.contains_key(app_id) {
            // Sequences continue from the store so reboots never reuse one.
            let next_seq = match inner.store.next_log_seq(app_id) {
                Ok(seq) => seq,
                Err(sdv_storage::StoreError::NotFound(_)) => {
                    tracing::debug!(%app_id, "dropping logs for unknown app");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(%app_id, error = %e, "log cursor read failed");
                    return None;
                }
            };
            let sink_path = inner.logs_dir.join(format!("{app_id}.log"));
            apps.insert(
                app_id.clone(),
                AppLogs {
                    next_seq,
                    ring: VecDeque::new(),
                    ring_bytes: 0,
                    stdout_partial: Partial { buf: Vec::new(), generation: 0 },
                    stderr_partial: Partial { buf: Vec::new(), generation: 0 },
                    subscribers: HashMap::new(),
                    tail_cancel: None,
                    sink: sink::FileSink::new(sink_path, inner.config.rotate_bytes),
                },
            );
        }
        apps.get_mut(app_id)
    }

    /// Clean, sequence, buffer, persist, and fan out one complete line.
    fn ingest_line(
        &self,
        app: &mut AppLogs,
        app_id: &AppId,
        stream: LogStreamKind,
        raw: &[u8],
        received: DateTime<Utc>,
    ) {
        let stripped = ansi::strip_ansi(raw);
        let text = String::from_utf8_lossy(&stripped);
        let (timestamp, content) = match parse::json_override(&text) {
            Some((ts, content)) => (ts.unwrap_or(received), content),
            None => (received, text.into_owned()),
        };
        let content = sdv_core::clamp_log_content(&content).to_string();

        let line = LogLine { app_id: app_id.clone(), seq: app.next_seq, timestamp, stream, content };
        app.next_seq += 1;

        // Ring buffer with line+byte caps; eviction preserves sequences.
        app.ring_bytes += line.content.len();
        app.ring.push_back(line.clone());
        while app.ring.len() > self.inner.config.max_lines
            || app.ring_bytes > self.inner.config.max_bytes
        {
            match app.ring.pop_front() {
                Some(evicted) => app.ring_bytes -= evicted.content.len(),
                None => break,
            }
        }

        if let Err(e) = app.sink.append(&line) {
            tracing::warn!(%app_id, error = %e, "log sink write failed");
        }
        let _ = self.inner.writer_tx.send(line.clone());

        for queue in app.subscribers.values() {
            queue.push(line.clone());
        }
    }
}

/// Coalesce queued lines into batched store writes, pruning as it goes.
async fn run_store_writer(
    store: Store,
    mut rx: mpsc::UnboundedReceiver<LogLine>,
    cancel: CancellationToken,
    db_max_lines: usize,
    db_max_bytes: u64,
) {
    let mut pending: Vec<LogLine> = Vec::new();
    let mut appended: HashMap<AppId, usize> = HashMap::new();

    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                pending.push(line);
                // Drain whatever else is queued before committing once.
                while pending.len() < 512 {
                    match rx.try_recv() {
                        Ok(line) => pending.push(line),
                        Err(_) => break,
                    }
                }
            }
            _ = cancel.cancelled() => {
                while let Ok(line) = rx.try_recv() {
                    pending.push(line);
                }
                flush(&store, &mut pending, &mut appended, db_max_lines, db_max_bytes);
                break;
            }
        }

        flush(&store, &mut pending, &mut appended, db_max_lines, db_max_bytes);
    }
}

fn flush(
    store: &Store,
    pending: &mut Vec<LogLine>,
    appended: &mut HashMap<AppId, usize>,
    db_max_lines: usize,
    db_max_bytes: u64,
) {
    if pending.is_empty() {
        return;
    }
    for line in pending.iter() {
        *appended.entry(line.app_id.clone()).or_default() += 1;
    }
    if let Err(e) = store.append_log_batch(pending) {
        tracing::warn!(error = %e, "log batch write failed");
    }
    pending.clear();

    // Prune any app that accumulated enough new rows to matter.
    appended.retain(|app_id, count| {
        if *count < 512 {
            return true;
        }
        if let Err(e) = store.prune_logs(app_id, db_max_lines, db_max_bytes) {
            tracing::debug!(%app_id, error = %e, "log prune failed");
        }
        false
    });
}

#[cfg(test)]
#[path = "loghub_tests.rs"]
mod tests;
