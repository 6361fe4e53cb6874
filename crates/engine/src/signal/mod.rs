// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal gateway: validated pass-through to the vehicle signal broker.
//!
//! Every path is checked against the schema before anything reaches the
//! broker. While the broker is away the gateway serves cached values marked
//! stale and reports a degraded runtime status; on reconnect it re-issues
//! every active subscription.

mod broker;
mod schema;

pub use broker::{BrokerEvent, BrokerTransport, FakeBroker, WsBroker};
pub use schema::{LeafMeta, SchemaNode, SignalSchema};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sdv_core::{ClientId, Event, RuntimeError, SubscriptionId};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown signal path: {0}")]
    UnknownPath(String),

    #[error("not a signal leaf: {0}")]
    NotALeaf(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("signal schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("broker rejected request: {0}")]
    BrokerRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GatewayError> for RuntimeError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownPath(p) => {
                RuntimeError::Validation(format!("unknown signal path {p}"))
            }
            GatewayError::NotALeaf(p) => {
                RuntimeError::Validation(format!("{p} is not a signal leaf"))
            }
            GatewayError::OutOfRange(m) => RuntimeError::Validation(m),
            GatewayError::SchemaInvalid(m) => RuntimeError::Fatal(m),
            GatewayError::SubscriptionNotFound(id) => {
                RuntimeError::NotFound(format!("subscription {id}"))
            }
            GatewayError::BrokerUnavailable(m) => RuntimeError::Transient(m),
            GatewayError::BrokerRejected(m) => RuntimeError::Engine(m),
            GatewayError::Io(e) => RuntimeError::Transient(e.to_string()),
        }
    }
}

/// One active subscription's bookkeeping.
#[derive(Debug, Clone)]
pub struct SignalSubscription {
    pub subscription_id: SubscriptionId,
    pub paths: Vec<String>,
    pub origin_client: ClientId,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

struct CacheEntry {
    value: Value,
    stale: bool,
}

struct GatewayInner {
    schema: SignalSchema,
    broker: Arc<dyn BrokerTransport>,
    subscriptions: Mutex<BTreeMap<SubscriptionId, SignalSubscription>>,
    cache: Mutex<BTreeMap<String, CacheEntry>>,
    event_tx: mpsc::Sender<Event>,
    /// Taken by `run`; created at construction so no broker event published
    /// before the pump starts is lost.
    broker_events: Mutex<Option<tokio::sync::broadcast::Receiver<BrokerEvent>>>,
}

/// The gateway. Cheap to clone.
#[derive(Clone)]
pub struct SignalGateway {
    inner: Arc<GatewayInner>,
}

impl SignalGateway {
    pub fn new(
        schema: SignalSchema,
        broker: Arc<dyn BrokerTransport>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        let broker_events = Mutex::new(Some(broker.events()));
        Self {
            inner: Arc::new(GatewayInner {
                schema,
                broker,
                subscriptions: Mutex::new(BTreeMap::new()),
                cache: Mutex::new(BTreeMap::new()),
                event_tx,
                broker_events,
            }),
        }
    }

    pub fn schema(&self) -> &SignalSchema {
        &self.inner.schema
    }

    /// Whether the broker connection is currently up. Drives the `degraded`
    /// runtime status.
    pub fn is_connected(&self) -> bool {
        self.inner.broker.is_connected()
    }

    /// Subscribe a client to a validated set of paths.
    pub async fn subscribe(
        &self,
        client: &ClientId,
        paths: Vec<String>,
    ) -> Result<SubscriptionId, GatewayError> {
        self.inner.schema.validate_all(paths.iter().map(String::as_str))?;
        if let Err(e) = self.inner.broker.subscribe(&paths).await {
            // Buffered-retry policy: bookkeeping survives broker loss, the
            // resubscribe happens on reconnect.
            tracing::warn!(error = %e, "broker subscribe deferred until reconnect");
        }

        let subscription = SignalSubscription {
            subscription_id: SubscriptionId::new(),
            paths,
            origin_client: client.clone(),
            created_at: Utc::now(),
            active: true,
        };
        let id = subscription.subscription_id.clone();
        self.inner.subscriptions.lock().insert(id.clone(), subscription);
        Ok(id)
    }

    pub fn unsubscribe(&self, subscription_id: &SubscriptionId) -> Result<(), GatewayError> {
        self.inner
            .subscriptions
            .lock()
            .remove(subscription_id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::SubscriptionNotFound(subscription_id.to_string()))
    }

    /// Drop every subscription belonging to a disconnecting client.
    pub fn drop_client(&self, client: &ClientId) -> usize {
        let mut subscriptions = self.inner.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|_, s| &s.origin_client != client);
        before - subscriptions.len()
    }

    pub fn list_subscriptions(&self) -> Vec<SignalSubscription> {
        self.inner.subscriptions.lock().values().cloned().collect()
    }

    /// Read current values. Falls back to the stale cache when the broker is
    /// away; `stale` reports which mode served the read.
    pub async fn get(
        &self,
        paths: &[String],
    ) -> Result<(BTreeMap<String, Value>, bool), GatewayError> {
        self.inner.schema.validate_all(paths.iter().map(String::as_str))?;

        match self.inner.broker.get(paths).await {
            Ok(values) => {
                let mut cache = self.inner.cache.lock();
                for (path, value) in &values {
                    cache.insert(
                        path.clone(),
                        CacheEntry { value: value.clone(), stale: false },
                    );
                }
                Ok((values, false))
            }
            Err(GatewayError::BrokerUnavailable(reason)) => {
                tracing::debug!(%reason, "serving cached signal values");
                let cache = self.inner.cache.lock();
                let values: BTreeMap<String, Value> = paths
                    .iter()
                    .filter_map(|p| cache.get(p).map(|e| (p.clone(), e.value.clone())))
                    .collect();
                Ok((values, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Write validated values through to the broker.
    pub async fn set(&self, updates: &BTreeMap<String, Value>) -> Result<(), GatewayError> {
        for (path, value) in updates {
            self.inner.schema.validate_value(path, value)?;
        }
        self.inner.broker.set(updates).await
    }

    /// Pump broker events: cache maintenance, resubscription, and fan-out.
    /// Owned by the runtime root; ends on cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = match self.inner.broker_events.lock().take() {
            Some(events) => events,
            None => self.inner.broker.events(),
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(BrokerEvent::Updates(updates)) => {
                        {
                            let mut cache = self.inner.cache.lock();
                            for (path, value) in &updates {
                                cache.insert(
                                    path.clone(),
                                    CacheEntry { value: value.clone(), stale: false },
                                );
                            }
                        }
                        let _ = self
                            .inner
                            .event_tx
                            .send(Event::SignalsUpdated { updates })
                            .await;
                    }
                    Ok(BrokerEvent::Connected) => {
                        let _ = self
                            .inner
                            .event_tx
                            .send(Event::BrokerConnection { connected: true })
                            .await;
                        self.resubscribe_all().await;
                    }
                    Ok(BrokerEvent::Disconnected) => {
                        self.inner.cache.lock().values_mut().for_each(|e| e.stale = true);
                        let _ = self
                            .inner
                            .event_tx
                            .send(Event::BrokerConnection { connected: false })
                            .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "gateway lagged behind broker events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    async fn resubscribe_all(&self) {
        let paths: Vec<String> = {
            let subscriptions = self.inner.subscriptions.lock();
            let mut paths: Vec<String> = subscriptions
                .values()
                .filter(|s| s.active)
                .flat_map(|s| s.paths.iter().cloned())
                .collect();
            paths.sort();
            paths.dedup();
            paths
        };
        if paths.is_empty() {
            return;
        }
        if let Err(e) = self.inner.broker.subscribe(&paths).await {
            tracing::warn!(error = %e, "resubscribe after reconnect failed");
        } else {
            tracing::info!(count = paths.len(), "re-established signal subscriptions");
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
