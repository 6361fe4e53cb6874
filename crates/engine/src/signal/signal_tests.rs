// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::signal::schema::tests::test_schema;
use tokio::sync::mpsc;

fn gateway() -> (SignalGateway, Arc<FakeBroker>, mpsc::Receiver<Event>) {
    let broker = Arc::new(FakeBroker::new());
    let (event_tx, event_rx) = mpsc::channel(64);
    let gateway = SignalGateway::new(test_schema(), broker.clone(), event_tx);
    (gateway, broker, event_rx)
}

#[tokio::test]
async fn subscribe_validates_and_books() {
    let (gateway, broker, _rx) = gateway();
    let client = ClientId::new();

    let sub = gateway
        .subscribe(&client, vec!["Vehicle.Speed".to_string()])
        .await
        .unwrap();
    assert!(sub.as_str().starts_with("sub-"));
    assert_eq!(broker.subscribed_paths(), vec!["Vehicle.Speed".to_string()]);
    assert_eq!(gateway.list_subscriptions().len(), 1);
}

#[tokio::test]
async fn subscribe_rejects_unknown_path() {
    let (gateway, _broker, _rx) = gateway();
    let client = ClientId::new();
    let err = gateway
        .subscribe(&client, vec!["Vehicle.Warp".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownPath(_)));
    assert!(gateway.list_subscriptions().is_empty());
}

#[tokio::test]
async fn unsubscribe_removes_booking() {
    let (gateway, _broker, _rx) = gateway();
    let client = ClientId::new();
    let sub = gateway
        .subscribe(&client, vec!["Vehicle.Cabin.Light".to_string()])
        .await
        .unwrap();

    gateway.unsubscribe(&sub).unwrap();
    assert!(gateway.list_subscriptions().is_empty());
    assert!(matches!(
        gateway.unsubscribe(&sub),
        Err(GatewayError::SubscriptionNotFound(_))
    ));
}

#[tokio::test]
async fn drop_client_removes_only_theirs() {
    let (gateway, _broker, _rx) = gateway();
    let alice = ClientId::new();
    let bob = ClientId::new();
    gateway.subscribe(&alice, vec!["Vehicle.Speed".to_string()]).await.unwrap();
    gateway.subscribe(&bob, vec!["Vehicle.Speed".to_string()]).await.unwrap();

    assert_eq!(gateway.drop_client(&alice), 1);
    assert_eq!(gateway.list_subscriptions().len(), 1);
}

#[tokio::test]
async fn get_fresh_values_and_cache_fallback() {
    let (gateway, broker, _rx) = gateway();
    broker.set_value("Vehicle.Speed", serde_json::json!(42.0));

    let paths = vec!["Vehicle.Speed".to_string()];
    let (values, stale) = gateway.get(&paths).await.unwrap();
    assert!(!stale);
    assert_eq!(values["Vehicle.Speed"], serde_json::json!(42.0));

    // Broker goes away; the cached value is served and marked stale
    broker.set_connected(false);
    let (values, stale) = gateway.get(&paths).await.unwrap();
    assert!(stale);
    assert_eq!(values["Vehicle.Speed"], serde_json::json!(42.0));
}

#[tokio::test]
async fn set_validates_range_before_forwarding() {
    let (gateway, broker, _rx) = gateway();

    let mut updates = BTreeMap::new();
    updates.insert("Vehicle.Speed".to_string(), serde_json::json!(500.0));
    assert!(matches!(gateway.set(&updates).await, Err(GatewayError::OutOfRange(_))));
    assert!(broker.recorded_sets().is_empty());

    updates.insert("Vehicle.Speed".to_string(), serde_json::json!(50.0));
    gateway.set(&updates).await.unwrap();
    assert_eq!(broker.recorded_sets().len(), 1);
}

#[tokio::test]
async fn run_fans_out_updates_and_tracks_connection() {
    let (gateway, broker, mut event_rx) = gateway();
    let client = ClientId::new();
    gateway.subscribe(&client, vec!["Vehicle.Speed".to_string()]).await.unwrap();

    let cancel = CancellationToken::new();
    let pump = {
        let gateway = gateway.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { gateway.run(cancel).await })
    };

    let mut updates = BTreeMap::new();
    updates.insert("Vehicle.Speed".to_string(), serde_json::json!(88.0));
    broker.push_update(updates.clone());

    let event = event_rx.recv().await.unwrap();
    assert_eq!(event, Event::SignalsUpdated { updates });

    // Disconnect marks the cache stale and reports degradation
    broker.set_connected(false);
    let event = event_rx.recv().await.unwrap();
    assert_eq!(event, Event::BrokerConnection { connected: false });

    // Reconnect resubscribes active paths
    broker.set_connected(true);
    let event = event_rx.recv().await.unwrap();
    assert_eq!(event, Event::BrokerConnection { connected: true });

    cancel.cancel();
    let _ = pump.await;
    assert!(gateway.is_connected());
}
