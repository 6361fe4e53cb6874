// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher shared by the local server and the hub bridge.
//!
//! Both transports decode a frame, build a [`RequestContext`], and hand the
//! request here. Replies and streaming pushes go back through the context's
//! outbound channel; the hub bridge wraps frames carrying a `request_from`
//! token, the local server sends them as-is. Every request runs under a
//! deadline; expiry produces a timeout error frame.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sdv_core::{AppId, Application, ClientId, LifecycleState, RuntimeError};
use sdv_engine::{AppManager, LogHub, SignalGateway};
use sdv_wire::{
    decode_request, encode_reply, AppSummary, ClientRequest, DeployOutcome, ManageAction,
    Prototype, ProtocolError, ServerMessage,
};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::sidecar::Sidecars;

/// Default per-request deadline.
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// One encoded frame headed back to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Present for hub-originated requests; echoed in the kit-reply wrapper.
    pub request_from: Option<String>,
    /// Fully encoded inner frame (id already injected).
    pub frame: String,
}

/// Per-request execution context.
#[derive(Clone)]
pub struct RequestContext {
    /// Stable per-connection (local) or per-remote-client (hub) identity.
    pub client: ClientId,
    /// Opaque hub routing token; None for local clients.
    pub request_from: Option<String>,
    /// Outbound channel of the owning transport.
    pub reply_tx: mpsc::Sender<OutboundFrame>,
}

struct DispatcherInner {
    manager: AppManager,
    hub: LogHub,
    gateway: SignalGateway,
    sidecars: Sidecars,
    config: Config,
    /// Every client seen on any transport, for push fan-out
    /// (`signals_updated`, `threshold_breach`). Entries leave on disconnect
    /// or on send failure.
    push_sinks:
        parking_lot::Mutex<std::collections::HashMap<ClientId, (Option<String>, mpsc::Sender<OutboundFrame>)>>,
}

/// The dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(
        manager: AppManager,
        hub: LogHub,
        gateway: SignalGateway,
        sidecars: Sidecars,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                manager,
                hub,
                gateway,
                sidecars,
                config,
                push_sinks: parking_lot::Mutex::new(std::collections::HashMap::new()),
            }),
        }
    }

    pub fn manager(&self) -> &AppManager {
        &self.inner.manager
    }

    pub fn hub(&self) -> &LogHub {
        &self.inner.hub
    }

    pub fn gateway(&self) -> &SignalGateway {
        &self.inner.gateway
    }

    /// Decode and execute one text frame.
    ///
    /// Returns the encoded reply, or `None` for malformed frames (dropped,
    /// connection kept). Streaming subscriptions send their frames through
    /// `ctx.reply_tx` after the reply.
    pub async fn dispatch_text(&self, text: &str, ctx: &RequestContext) -> Option<String> {
        self.inner.push_sinks.lock().insert(
            ctx.client.clone(),
            (ctx.request_from.clone(), ctx.reply_tx.clone()),
        );

        let (id, request) = match decode_request(text) {
            Ok(decoded) => decoded,
            Err(ProtocolError::Malformed(reason)) => {
                tracing::debug!(%reason, "dropping malformed frame");
                return None;
            }
            Err(ProtocolError::UnknownType(name)) => {
                let id = correlation_id(text);
                let reply = ServerMessage::Error {
                    error: format!("unknown message type: {name}"),
                    kind: Some("validation_failed".to_string()),
                };
                return Some(encode_reply(id.as_deref(), &reply));
            }
            Err(ProtocolError::InvalidPayload(name, reason)) => {
                let id = correlation_id(text);
                let reply = ServerMessage::Error {
                    error: format!("invalid {name} payload: {reason}"),
                    kind: Some("validation_failed".to_string()),
                };
                return Some(encode_reply(id.as_deref(), &reply));
            }
        };

        let type_name = request.type_name();
        let reply = match tokio::time::timeout(REQUEST_DEADLINE, self.handle(request, ctx)).await
        {
            Ok(reply) => reply,
            Err(_) => ServerMessage::from_error(&RuntimeError::Timeout(format!(
                "{type_name} exceeded {}s deadline",
                REQUEST_DEADLINE.as_secs()
            ))),
        };
        Some(encode_reply(id.as_deref(), &reply))
    }

    async fn handle(&self, request: ClientRequest, ctx: &RequestContext) -> ServerMessage {
        match request {
            ClientRequest::Ping => ServerMessage::Pong,

            ClientRequest::GetRuntimeInfo => self.runtime_info(),

            ClientRequest::DeployRequest { prototype, vehicle_id, code } => {
                self.deploy(prototype, vehicle_id, code).await
            }

            ClientRequest::ListDeployedApps => self.list_apps(),

            ClientRequest::ManageApp { app_id, action } => {
                self.manage(&app_id, action).await
            }

            ClientRequest::StopApp { app_id } => {
                match self.manage(&app_id, ManageAction::Stop).await {
                    ServerMessage::ManageApp { app_id, state, .. } => {
                        ServerMessage::StopApp { app_id, state }
                    }
                    other => other,
                }
            }

            ClientRequest::GetAppStatus { app_id } => self.app_status(&app_id),

            ClientRequest::AppLogSubscribe { app_id } => self.log_subscribe(&app_id, ctx),

            ClientRequest::AppLogUnsubscribe { app_id } => {
                let app_id = match app_id.map(|id| AppId::parse(&id)).transpose() {
                    Ok(app_id) => app_id,
                    Err(reason) => {
                        return ServerMessage::from_error(&RuntimeError::Validation(reason))
                    }
                };
                let removed = self.inner.hub.unsubscribe(&ctx.client, app_id.as_ref());
                ServerMessage::LogUnsubscribed { removed }
            }

            ClientRequest::VehicleSignalSubscribe { paths } => {
                match self.inner.gateway.subscribe(&ctx.client, paths.clone()).await {
                    Ok(subscription_id) => ServerMessage::SignalSubscribed {
                        subscription_id: subscription_id.to_string(),
                        paths,
                    },
                    Err(e) => ServerMessage::from_error(&e.into()),
                }
            }

            ClientRequest::VehicleSignalUnsubscribe { subscription_id } => {
                let subscription_id =
                    sdv_core::SubscriptionId::from_string(subscription_id);
                match self.inner.gateway.unsubscribe(&subscription_id) {
                    Ok(()) => ServerMessage::SignalUnsubscribed { removed: true },
                    Err(e) => ServerMessage::from_error(&e.into()),
                }
            }

            ClientRequest::VehicleSignalGet { paths } => {
                match self.inner.gateway.get(&paths).await {
                    Ok((values, stale)) => ServerMessage::SignalValues { values, stale },
                    Err(e) => ServerMessage::from_error(&e.into()),
                }
            }

            ClientRequest::VehicleSignalSet { updates } => {
                match self.inner.gateway.set(&updates).await {
                    Ok(()) => ServerMessage::SignalSetAck { ack: true },
                    Err(e) => ServerMessage::from_error(&e.into()),
                }
            }

            ClientRequest::MockServiceStatus => self.inner.sidecars.mock_status().await,

            ClientRequest::MockServiceStart => self.inner.sidecars.mock_start().await,

            ClientRequest::MockServiceStop => self.inner.sidecars.mock_stop().await,

            ClientRequest::MockServiceConfigure { config } => {
                self.inner.sidecars.mock_configure(config).await
            }

            ClientRequest::KuksaServerDeployment { action } => {
                self.inner.sidecars.kuksa(action).await
            }
        }
    }

    fn runtime_info(&self) -> ServerMessage {
        let degraded = !self.inner.gateway.is_connected();
        ServerMessage::RuntimeInfo {
            runtime_id: self.inner.config.runtime_id.clone(),
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            capabilities: vec![
                "apps".to_string(),
                "logs".to_string(),
                "signals".to_string(),
                "sidecars".to_string(),
            ],
            port: self.inner.config.port,
        }
    }

    async fn deploy(
        &self,
        prototype: Prototype,
        vehicle_id: Option<String>,
        code: Option<String>,
    ) -> ServerMessage {
        let kit_id = self.inner.config.runtime_id.clone();
        let requested_id = prototype.id.clone();
        let draft = match application_from_prototype(prototype, code) {
            Ok(draft) => draft,
            Err(reason) => {
                return deploy_failure(requested_id, kit_id, reason);
            }
        };

        match self.inner.manager.deploy(draft, vehicle_id.as_deref()).await {
            Ok(result) => ServerMessage::Deploy {
                execution_id: result
                    .execution_id
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
                app_id: result.app_id.to_string(),
                status: DeployOutcome::Started,
                result: result.message,
                is_done: true,
                code: 0,
                kit_id,
                timestamp: Utc::now(),
            },
            Err(e) => deploy_failure(requested_id, kit_id, e.to_string()),
        }
    }

    fn list_apps(&self) -> ServerMessage {
        match self.inner.manager.list() {
            Ok(entries) => {
                let running_count = entries
                    .iter()
                    .filter(|(_, state)| state.current_state == LifecycleState::Running)
                    .count();
                let applications: Vec<AppSummary> = entries
                    .into_iter()
                    .map(|(app, state)| AppSummary {
                        id: app.id.to_string(),
                        name: app.name,
                        app_type: app.app_type,
                        status: state.current_state,
                        version: app.version,
                        auto_start: app.auto_start,
                        container_id: state.container_id,
                        created_at: app.created_at,
                        updated_at: app.updated_at,
                    })
                    .collect();
                ServerMessage::DeployedApps {
                    total_count: applications.len(),
                    running_count,
                    applications,
                }
            }
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    async fn manage(&self, app_id: &str, action: ManageAction) -> ServerMessage {
        let app_id = match AppId::parse(app_id) {
            Ok(app_id) => app_id,
            Err(reason) => return ServerMessage::from_error(&RuntimeError::Validation(reason)),
        };
        let manager = &self.inner.manager;

        let outcome: Result<LifecycleState, RuntimeError> = match action {
            ManageAction::Start => {
                manager.start(&app_id, None).await.map(|_| LifecycleState::Running)
            }
            ManageAction::Stop => manager.stop(&app_id).await,
            ManageAction::Restart => {
                manager.restart(&app_id).await.map(|_| LifecycleState::Running)
            }
            ManageAction::Pause => manager.pause(&app_id).await,
            ManageAction::Resume => manager.resume(&app_id).await,
            ManageAction::Remove => manager.remove(&app_id).await.map(|()| {
                self.inner.hub.forget_app(&app_id);
                LifecycleState::Stopped
            }),
        };

        match outcome {
            Ok(state) => ServerMessage::ManageApp {
                app_id: app_id.to_string(),
                action: action.as_str().to_string(),
                state,
            },
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    fn app_status(&self, app_id: &str) -> ServerMessage {
        let app_id = match AppId::parse(app_id) {
            Ok(app_id) => app_id,
            Err(reason) => return ServerMessage::from_error(&RuntimeError::Validation(reason)),
        };
        match self.inner.manager.status(&app_id) {
            Ok((state, _history)) => ServerMessage::AppStatus {
                app_id: app_id.to_string(),
                state: Box::new(state),
            },
            Err(e) => ServerMessage::from_error(&e),
        }
    }

    /// Attach a log subscription and start its pump task.
    fn log_subscribe(&self, app_id: &str, ctx: &RequestContext) -> ServerMessage {
        let app_id = match AppId::parse(app_id) {
            Ok(app_id) => app_id,
            Err(reason) => return ServerMessage::from_error(&RuntimeError::Validation(reason)),
        };
        if let Err(e) = self.inner.manager.ctx().store.get_application(&app_id) {
            return ServerMessage::from_error(&e.into());
        }

        let (subscription, replayed) = self.inner.hub.subscribe(&ctx.client, &app_id);

        let reply_tx = ctx.reply_tx.clone();
        let request_from = ctx.request_from.clone();
        let hub = self.inner.hub.clone();
        let client = ctx.client.clone();
        let pump_app = app_id.clone();
        tokio::spawn(async move {
            while let Some(line) = subscription.recv().await {
                let frame = encode_reply(None, &ServerMessage::from_log_line(&line));
                let outbound = OutboundFrame { request_from: request_from.clone(), frame };
                if reply_tx.send(outbound).await.is_err() {
                    // Transport went away; tear the subscription down.
                    hub.unsubscribe(&client, Some(&pump_app));
                    break;
                }
            }
        });

        ServerMessage::LogSubscribed { app_id: app_id.to_string(), replayed }
    }
}

impl Dispatcher {
    /// Fan a push frame out to every known client. Dead sinks are pruned.
    pub async fn broadcast_push(&self, frame: String) {
        let sinks: Vec<(ClientId, Option<String>, mpsc::Sender<OutboundFrame>)> = self
            .inner
            .push_sinks
            .lock()
            .iter()
            .map(|(client, (request_from, tx))| {
                (client.clone(), request_from.clone(), tx.clone())
            })
            .collect();

        for (client, request_from, tx) in sinks {
            let outbound = OutboundFrame { request_from, frame: frame.clone() };
            if tx.send(outbound).await.is_err() {
                self.inner.push_sinks.lock().remove(&client);
            }
        }
    }

    /// Forget a departed client's push sink.
    pub fn forget_sink(&self, client: &ClientId) {
        self.inner.push_sinks.lock().remove(client);
    }
}

/// Sent when a client disconnects: releases its subscriptions.
pub fn drop_client(hub: &LogHub, gateway: &SignalGateway, client: &ClientId) {
    let logs = hub.unsubscribe(client, None);
    let signals = gateway.drop_client(client);
    if logs > 0 || signals > 0 {
        tracing::debug!(%client, logs, signals, "released subscriptions for departed client");
    }
}

fn deploy_failure(app_id: String, kit_id: String, reason: String) -> ServerMessage {
    ServerMessage::Deploy {
        execution_id: String::new(),
        app_id,
        status: DeployOutcome::Failed,
        result: reason,
        is_done: true,
        code: 1,
        kit_id,
        timestamp: Utc::now(),
    }
}

/// Build the persistent record from the wire prototype.
pub fn application_from_prototype(
    prototype: Prototype,
    code_override: Option<String>,
) -> Result<Application, String> {
    let id = AppId::parse(&prototype.id)?;
    let now = Utc::now();
    let app = Application {
        name: prototype.name.unwrap_or_else(|| prototype.id.clone()),
        id,
        description: prototype.description,
        version: prototype.version,
        app_type: prototype.app_type,
        code: code_override.or(prototype.code),
        entry_point: prototype
            .entry_point
            .or_else(|| {
                (prototype.app_type == sdv_core::AppType::Python).then(|| "main.py".to_string())
            }),
        binary_path: prototype.binary_path,
        working_dir: prototype.working_dir,
        args: prototype.args,
        env: prototype.env,
        python_deps: prototype.python_deps,
        vehicle_signals: prototype.vehicle_signals,
        data_path: None,
        config: prototype.config,
        status: LifecycleState::Installed,
        auto_start: prototype.auto_start,
        restart_policy: prototype.restart_policy,
        resources: prototype.resources,
        created_at: now,
        updated_at: now,
    };
    app.validate()?;
    Ok(app)
}

/// Best-effort id extraction for error replies to undecodable-but-JSON frames.
fn correlation_id(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
pub(crate) mod tests;
