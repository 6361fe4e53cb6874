// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker transport.
//!
//! The gateway talks to the vehicle signal broker through this trait.
//! [`WsBroker`] is the real client: a single WebSocket with JSON frames,
//! request/response correlation, and server-pushed subscription updates.
//! [`FakeBroker`] backs the tests and the broker-less development mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::signal::GatewayError;

/// Connectivity and value updates pushed up to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    Connected,
    Disconnected,
    Updates(BTreeMap<String, Value>),
}

/// Transport to the signal broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn get(&self, paths: &[String]) -> Result<BTreeMap<String, Value>, GatewayError>;

    async fn set(&self, updates: &BTreeMap<String, Value>) -> Result<(), GatewayError>;

    /// Ask the broker to push updates for these paths. Safe to call again
    /// with an extended set after reconnect.
    async fn subscribe(&self, paths: &[String]) -> Result<(), GatewayError>;

    /// Event stream (connectivity + pushed updates).
    fn events(&self) -> broadcast::Receiver<BrokerEvent>;

    fn is_connected(&self) -> bool;
}

// ---------------------------------------------------------------------------
// WebSocket client
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

struct WsShared {
    url: String,
    next_request: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>,
    outbound: mpsc::UnboundedSender<Message>,
    events: broadcast::Sender<BrokerEvent>,
    connected: AtomicBool,
}

/// WebSocket broker client with automatic reconnect.
#[derive(Clone)]
pub struct WsBroker {
    shared: Arc<WsShared>,
}

impl WsBroker {
    /// Create the client and start its connection task.
    pub fn connect(url: String, cancel: CancellationToken) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(64);
        let shared = Arc::new(WsShared {
            url,
            next_request: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound: outbound_tx,
            events: events_tx,
            connected: AtomicBool::new(false),
        });
        tokio::spawn(run_connection(Arc::clone(&shared), outbound_rx, cancel));
        Self { shared }
    }

    async fn request(&self, mut frame: Value) -> Result<Value, GatewayError> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(GatewayError::BrokerUnavailable("not connected".to_string()));
        }
        let request_id = self.shared.next_request.fetch_add(1, Ordering::SeqCst);
        if let Some(obj) = frame.as_object_mut() {
            obj.insert("requestId".to_string(), Value::from(request_id.to_string()));
        }
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(request_id, tx);
        let _ = self.shared.outbound.send(Message::Text(frame.to_string().into()));

        let result = tokio::time::timeout(REQUEST_TIMEOUT, rx).await;
        self.shared.pending.lock().remove(&request_id);
        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(GatewayError::BrokerRejected(message)),
            Ok(Err(_)) => Err(GatewayError::BrokerUnavailable("connection lost".to_string())),
            Err(_) => Err(GatewayError::BrokerUnavailable("request timed out".to_string())),
        }
    }
}

#[async_trait]
impl BrokerTransport for WsBroker {
    async fn get(&self, paths: &[String]) -> Result<BTreeMap<String, Value>, GatewayError> {
        let reply = self
            .request(serde_json::json!({ "action": "get", "paths": paths }))
            .await?;
        let mut values = BTreeMap::new();
        if let Some(obj) = reply.get("values").and_then(Value::as_object) {
            for (path, value) in obj {
                values.insert(path.clone(), value.clone());
            }
        }
        Ok(values)
    }

    async fn set(&self, updates: &BTreeMap<String, Value>) -> Result<(), GatewayError> {
        self.request(serde_json::json!({ "action": "set", "updates": updates }))
            .await
            .map(|_| ())
    }

    async fn subscribe(&self, paths: &[String]) -> Result<(), GatewayError> {
        self.request(serde_json::json!({ "action": "subscribe", "paths": paths }))
            .await
            .map(|_| ())
    }

    fn events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.shared.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

/// Connection task: dial, pump frames, reconnect with backoff.
async fn run_connection(
    shared: Arc<WsShared>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match tokio_tungstenite::connect_async(shared.url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(url = %shared.url, "broker connected");
                backoff = INITIAL_BACKOFF;
                shared.connected.store(true, Ordering::SeqCst);
                let _ = shared.events.send(BrokerEvent::Connected);

                let (mut write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = write.send(Message::Close(None)).await;
                            shared.connected.store(false, Ordering::SeqCst);
                            return;
                        }
                        frame = outbound.recv() => match frame {
                            Some(frame) => {
                                if write.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            None => return,
                        },
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                handle_inbound(&shared, &text);
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "broker read error");
                                break;
                            }
                        }
                    }
                }

                shared.connected.store(false, Ordering::SeqCst);
                let _ = shared.events.send(BrokerEvent::Disconnected);
                fail_pending(&shared);
            }
            Err(e) => {
                tracing::warn!(url = %shared.url, error = %e, "broker connect failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn handle_inbound(shared: &WsShared, text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return;
    };

    // Subscription pushes have no requestId.
    if value.get("action").and_then(Value::as_str) == Some("subscription") {
        if let Some(updates) = value.get("updates").and_then(Value::as_object) {
            let updates: BTreeMap<String, Value> =
                updates.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let _ = shared.events.send(BrokerEvent::Updates(updates));
        }
        return;
    }

    let Some(request_id) = value
        .get("requestId")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
    else {
        return;
    };
    let Some(tx) = shared.pending.lock().remove(&request_id) else {
        return;
    };
    let result = match value.get("error").and_then(Value::as_str) {
        Some(error) => Err(error.to_string()),
        None => Ok(value),
    };
    let _ = tx.send(result);
}

fn fail_pending(shared: &WsShared) {
    let pending: Vec<_> = shared.pending.lock().drain().collect();
    for (_, tx) in pending {
        let _ = tx.send(Err("connection lost".to_string()));
    }
}

// ---------------------------------------------------------------------------
// Fake broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBrokerState {
    values: BTreeMap<String, Value>,
    subscribed: Vec<String>,
    sets: Vec<BTreeMap<String, Value>>,
}

/// In-memory broker for tests and broker-less development.
pub struct FakeBroker {
    state: Mutex<FakeBrokerState>,
    events: broadcast::Sender<BrokerEvent>,
    connected: AtomicBool,
}

impl Default for FakeBroker {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self { state: Mutex::new(FakeBrokerState::default()), events, connected: AtomicBool::new(true) }
    }
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a current value.
    pub fn set_value(&self, path: &str, value: Value) {
        self.state.lock().values.insert(path.to_string(), value);
    }

    /// Push a subscription update to listeners.
    pub fn push_update(&self, updates: BTreeMap<String, Value>) {
        {
            let mut state = self.state.lock();
            for (path, value) in &updates {
                state.values.insert(path.clone(), value.clone());
            }
        }
        let _ = self.events.send(BrokerEvent::Updates(updates));
    }

    /// Simulate losing / regaining the broker connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        let event = if connected { BrokerEvent::Connected } else { BrokerEvent::Disconnected };
        let _ = self.events.send(event);
    }

    pub fn subscribed_paths(&self) -> Vec<String> {
        self.state.lock().subscribed.clone()
    }

    pub fn recorded_sets(&self) -> Vec<BTreeMap<String, Value>> {
        self.state.lock().sets.clone()
    }
}

#[async_trait]
impl BrokerTransport for FakeBroker {
    async fn get(&self, paths: &[String]) -> Result<BTreeMap<String, Value>, GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::BrokerUnavailable("fake broker offline".to_string()));
        }
        let state = self.state.lock();
        Ok(paths
            .iter()
            .filter_map(|p| state.values.get(p).map(|v| (p.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, updates: &BTreeMap<String, Value>) -> Result<(), GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::BrokerUnavailable("fake broker offline".to_string()));
        }
        let mut state = self.state.lock();
        for (path, value) in updates {
            state.values.insert(path.clone(), value.clone());
        }
        state.sets.push(updates.clone());
        Ok(())
    }

    async fn subscribe(&self, paths: &[String]) -> Result<(), GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::BrokerUnavailable("fake broker offline".to_string()));
        }
        let mut state = self.state.lock();
        for path in paths {
            if !state.subscribed.contains(path) {
                state.subscribed.push(path.clone());
            }
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
