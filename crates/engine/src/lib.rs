// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application lifecycle engine.
//!
//! Everything between the wire and the store: the container driver, the log
//! hub, per-application supervisors and their registry, the credential
//! vault, the signal gateway, and the resource monitor.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod deps;
pub mod docker;
pub mod loghub;
pub mod manager;
pub mod monitor;
pub mod paths;
pub mod signal;
pub mod supervisor;
pub mod vault;

pub use docker::{
    Bind, CliOutput, ContainerEngine, ContainerSpec, ContainerState, EngineError, ExitInfo,
    FakeEngine, LiveEngine, LogChunk, NetworkMode, StatsSnapshot, LABEL_APP_ID, LABEL_RUNTIME,
    LABEL_RUNTIME_VALUE,
};
pub use loghub::{LogHub, LogHubConfig, LogSubscription};
pub use manager::{AppManager, DeployResult};
pub use monitor::ResourceMonitor;
pub use paths::StoragePaths;
pub use signal::{
    BrokerEvent, BrokerTransport, FakeBroker, GatewayError, SignalGateway, SignalSchema,
    SignalSubscription, WsBroker,
};
pub use supervisor::{ExitOutcome, Supervisor, SupervisorCtx, STOP_GRACE};
pub use vault::{run_refresh_task, CredentialVault, NoRefresh, RefreshHook, VaultError};
