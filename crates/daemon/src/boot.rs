// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime root: boot order, component wiring, shutdown.
//!
//! Components come up leaves-first: store, vault, log hub, container
//! driver, resource monitor, app manager (reconciliation + auto-start),
//! signal gateway, local server, hub bridge. Shutdown walks the same list
//! in reverse, giving each side ten seconds to drain before it is dropped.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use sdv_core::Event;
use sdv_engine::{
    AppManager, ContainerEngine, CredentialVault, FakeBroker, LiveEngine, LogHub, LogHubConfig,
    NoRefresh, ResourceMonitor, SignalGateway, SignalSchema, StoragePaths, SupervisorCtx,
    WsBroker,
};
use sdv_storage::Store;
use sdv_wire::{encode_reply, ServerMessage};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::sidecar::Sidecars;

/// How long each component may take to drain at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Stats sampling interval.
const MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Fatal initialization errors (exit code 1).
#[derive(Debug, Error)]
pub enum BootError {
    #[error("another runtime instance holds {0}")]
    AlreadyRunning(String),

    #[error("store initialization failed: {0}")]
    Store(#[from] sdv_storage::StoreError),

    #[error("credential vault failed: {0}")]
    Vault(#[from] sdv_engine::VaultError),

    #[error("signal schema failed: {0}")]
    Schema(String),

    #[error("container engine unavailable: {0}")]
    Engine(#[from] sdv_engine::EngineError),

    #[error("could not bind port {0}: {1}")]
    Bind(u16, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running runtime instance.
pub struct Runtime {
    pub config: Config,
    pub dispatcher: Dispatcher,
    hub: LogHub,
    vault: Arc<CredentialVault>,
    monitor: ResourceMonitor,
    gateway: SignalGateway,
    manager: AppManager,
    listener: Option<TcpListener>,
    event_rx: Option<mpsc::Receiver<Event>>,
    // NOTE(lifetime): held for the exclusive instance lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    cancel: CancellationToken,
}

impl Runtime {
    /// Bring up every component in boot order. The engine is probed but a
    /// broker connection is not required (degraded mode).
    pub async fn boot(config: Config) -> Result<Self, BootError> {
        let paths = StoragePaths::new(&config.data_dir);
        std::fs::create_dir_all(paths.root())?;

        // Single instance per data dir
        let lock_file = File::create(paths.pid_file())?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| BootError::AlreadyRunning(paths.pid_file().display().to_string()))?;
        std::fs::write(paths.pid_file(), format!("{}\n", std::process::id()))?;

        // 1. Store
        let store = Store::open(&paths.database())?;

        // 2. Credential vault
        let vault = Arc::new(CredentialVault::open(paths.credentials(), Arc::new(NoRefresh))?);

        // 3. Log hub
        let hub = LogHub::new(store.clone(), paths.logs_dir(), LogHubConfig::default());

        // 4. Container driver
        let engine: Arc<dyn ContainerEngine> = Arc::new(LiveEngine::connect()?);
        if let Some(err) = engine_probe(&engine).await {
            return Err(err);
        }

        let (event_tx, event_rx) = mpsc::channel::<Event>(256);
        let cancel = CancellationToken::new();

        // 5. Resource monitor
        let monitor = ResourceMonitor::new(
            Arc::clone(&engine),
            store.clone(),
            paths.clone(),
            event_tx.clone(),
            MONITOR_INTERVAL,
        );

        // 6. App manager
        let ctx = SupervisorCtx {
            store: store.clone(),
            engine: Arc::clone(&engine),
            hub: hub.clone(),
            vault: Arc::clone(&vault),
            paths: paths.clone(),
            event_tx: event_tx.clone(),
            broker_url: config.broker_url.clone(),
        };
        let manager = AppManager::new(ctx);

        // 7. Signal gateway
        let schema = SignalSchema::load(&paths.signal_schema())
            .map_err(|e| BootError::Schema(e.to_string()))?;
        let broker: Arc<dyn sdv_engine::BrokerTransport> = if config.broker_url.is_empty() {
            Arc::new(FakeBroker::new())
        } else {
            Arc::new(WsBroker::connect(config.broker_url.clone(), cancel.child_token()))
        };
        let gateway = SignalGateway::new(schema, broker, event_tx.clone());

        // 8. Local server socket
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(|e| BootError::Bind(config.port, e))?;

        let sidecars = Sidecars::new(manager.clone());
        let dispatcher = Dispatcher::new(
            manager.clone(),
            hub.clone(),
            gateway.clone(),
            sidecars,
            config.clone(),
        );

        Ok(Self {
            config,
            dispatcher,
            hub,
            vault,
            monitor,
            gateway,
            manager,
            listener: Some(listener),
            event_rx: Some(event_rx),
            lock_file,
            cancel,
        })
    }

    /// Run until `shutdown` is cancelled externally (signal handling lives
    /// in `main`).
    pub async fn run(&mut self) {
        // Orphan reconciliation before anything can race it, then auto-start.
        self.manager.reconcile_orphans().await;
        self.manager.autostart().await;

        let cancel = self.cancel.clone();

        if let Some(event_rx) = self.event_rx.take() {
            tokio::spawn(run_event_pump(
                event_rx,
                self.manager.clone(),
                self.dispatcher.clone(),
                cancel.child_token(),
            ));
        }

        tokio::spawn(sdv_engine::vault::run_refresh_task(
            Arc::clone(&self.vault),
            cancel.child_token(),
        ));
        tokio::spawn(self.monitor.clone().run(cancel.child_token()));
        {
            let gateway = self.gateway.clone();
            let token = cancel.child_token();
            tokio::spawn(async move { gateway.run(token).await });
        }

        if let Some(listener) = self.listener.take() {
            tokio::spawn(crate::server::run_local_server(
                listener,
                self.dispatcher.clone(),
                cancel.child_token(),
            ));
        }

        if let Some(hub_url) = self.config.hub_url.clone() {
            tokio::spawn(crate::hub::run_hub_bridge(
                hub_url,
                self.config.runtime_id.clone(),
                self.dispatcher.clone(),
                cancel.child_token(),
            ));
        } else {
            tracing::info!("hub bridge disabled");
        }

        tracing::info!(
            port = self.config.port,
            runtime_id = %self.config.runtime_id,
            data_dir = %self.config.data_dir.display(),
            "runtime ready"
        );

        cancel.cancelled().await;
    }

    /// Signal every task to stop and drain in reverse boot order.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down");
        // Transports stop taking requests first.
        self.cancel.cancel();

        // Supervisors attempt graceful container stops.
        if tokio::time::timeout(DRAIN_TIMEOUT, self.manager.stop_all()).await.is_err() {
            tracing::warn!("application drain exceeded {}s", DRAIN_TIMEOUT.as_secs());
        }

        // Flush buffered log lines to the store.
        if tokio::time::timeout(DRAIN_TIMEOUT, self.hub.shutdown()).await.is_err() {
            tracing::warn!("log writer drain exceeded {}s", DRAIN_TIMEOUT.as_secs());
        }

        tracing::info!("shutdown complete");
    }

    /// Cancellation handle for signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn engine_probe(engine: &Arc<dyn ContainerEngine>) -> Option<BootError> {
    // A cheap call that fails fast when the engine socket is absent.
    match engine.list_by_label(sdv_engine::LABEL_RUNTIME, sdv_engine::LABEL_RUNTIME_VALUE).await
    {
        Ok(_) => None,
        Err(e) => Some(BootError::Engine(e)),
    }
}

/// Route runtime events: container exits feed the manager; subscriber-facing
/// events fan out as pushes to every connected client via the dispatcher's
/// broadcast hooks.
async fn run_event_pump(
    mut event_rx: mpsc::Receiver<Event>,
    manager: AppManager,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => match event {
                Some(Event::ContainerExited { app_id, execution_id, exit_code }) => {
                    manager.handle_container_exit(&app_id, &execution_id, exit_code).await;
                }
                Some(Event::SignalsUpdated { updates }) => {
                    let frame =
                        encode_reply(None, &ServerMessage::SignalsUpdated { updates });
                    dispatcher.broadcast_push(frame).await;
                }
                Some(Event::ThresholdBreach { app_id, resource, value, limit, severity }) => {
                    let frame = encode_reply(
                        None,
                        &ServerMessage::ThresholdBreach {
                            app_id: app_id.to_string(),
                            resource,
                            value,
                            limit,
                            severity,
                        },
                    );
                    dispatcher.broadcast_push(frame).await;
                }
                Some(Event::BrokerConnection { connected }) => {
                    tracing::info!(connected, "broker connectivity changed");
                }
                Some(_) => {}
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "boot_tests.rs"]
mod tests;
