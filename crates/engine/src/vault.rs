// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-vehicle credential vault.
//!
//! Credentials live in one JSON file rewritten atomically (write-temp,
//! fsync, rename). A periodic task refreshes tokens that are close to
//! expiry through a pluggable [`RefreshHook`]; the task is owned here and
//! cancelled on shutdown.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sdv_core::{Clock, RuntimeError, SystemClock, VehicleCredential};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How often the refresh task scans the vault.
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Tokens expiring within this window are refreshed proactively.
fn refresh_window() -> chrono::Duration {
    chrono::Duration::minutes(5)
}

/// Vault errors
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no credentials for vehicle {0}")]
    NoCredentials(String),

    #[error("token refresh failed for vehicle {0}: {1}")]
    RefreshFailed(String, String),

    #[error("vault IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vault file is corrupt: {0}")]
    Corrupt(String),
}

impl From<VaultError> for RuntimeError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NoCredentials(v) => RuntimeError::NotFound(format!("credentials for {v}")),
            VaultError::RefreshFailed(v, m) => {
                RuntimeError::Transient(format!("refresh for {v}: {m}"))
            }
            VaultError::Io(e) => RuntimeError::Transient(e.to_string()),
            VaultError::Corrupt(m) => RuntimeError::Fatal(m),
        }
    }
}

/// Pluggable token refresh. The real endpoint is deployment-specific; the
/// default hook reports failure so expired credentials surface instead of
/// silently sticking around.
#[async_trait]
pub trait RefreshHook: Send + Sync {
    async fn refresh(
        &self,
        credential: &VehicleCredential,
    ) -> Result<VehicleCredential, String>;
}

/// Hook used when no refresh endpoint is configured.
pub struct NoRefresh;

#[async_trait]
impl RefreshHook for NoRefresh {
    async fn refresh(&self, _: &VehicleCredential) -> Result<VehicleCredential, String> {
        Err("no refresh endpoint configured".to_string())
    }
}

/// The vault.
pub struct CredentialVault<C: Clock = SystemClock> {
    path: PathBuf,
    credentials: Mutex<BTreeMap<String, VehicleCredential>>,
    hook: Arc<dyn RefreshHook>,
    clock: C,
}

impl CredentialVault<SystemClock> {
    /// Load (or initialize) the vault at `path`.
    pub fn open(path: PathBuf, hook: Arc<dyn RefreshHook>) -> Result<Self, VaultError> {
        Self::open_with_clock(path, hook, SystemClock)
    }
}

impl<C: Clock> CredentialVault<C> {
    pub fn open_with_clock(
        path: PathBuf,
        hook: Arc<dyn RefreshHook>,
        clock: C,
    ) -> Result<Self, VaultError> {
        let credentials = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| VaultError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(VaultError::Io(e)),
        };
        Ok(Self { path, credentials: Mutex::new(credentials), hook, clock })
    }

    /// Store or replace a vehicle's credentials.
    pub fn register(&self, credential: VehicleCredential) -> Result<(), VaultError> {
        let mut credentials = self.credentials.lock();
        credentials.insert(credential.vehicle_id.clone(), credential);
        self.persist(&credentials)
    }

    pub fn remove(&self, vehicle_id: &str) -> Result<bool, VaultError> {
        let mut credentials = self.credentials.lock();
        let removed = credentials.remove(vehicle_id).is_some();
        if removed {
            self.persist(&credentials)?;
        }
        Ok(removed)
    }

    pub fn list_vehicles(&self) -> Vec<String> {
        self.credentials.lock().keys().cloned().collect()
    }

    /// A currently-valid access token for the vehicle.
    ///
    /// Expired (or imminently expiring) tokens are refreshed through the
    /// hook before being returned. Updates `last_used`.
    pub async fn get_access_token(
        &self,
        vehicle_id: &str,
        _scopes: &[String],
    ) -> Result<String, VaultError> {
        let now = self.clock.now_utc();
        let current = self
            .credentials
            .lock()
            .get(vehicle_id)
            .cloned()
            .ok_or_else(|| VaultError::NoCredentials(vehicle_id.to_string()))?;

        let credential = if current.expires_within(now, refresh_window()) {
            match self.hook.refresh(&current).await {
                Ok(refreshed) => refreshed,
                Err(reason) if current.expires_at > now => {
                    // Refresh failed but the token is still usable.
                    tracing::warn!(vehicle_id, %reason, "token refresh failed, using remaining validity");
                    current
                }
                Err(reason) => {
                    return Err(VaultError::RefreshFailed(vehicle_id.to_string(), reason))
                }
            }
        } else {
            current
        };

        let token = credential.access_token.clone();
        {
            let mut credentials = self.credentials.lock();
            let mut updated = credential;
            updated.last_used = Some(now);
            credentials.insert(vehicle_id.to_string(), updated);
            self.persist(&credentials)?;
        }
        Ok(token)
    }

    /// Refresh every credential expiring within the window. Returns how many
    /// were refreshed.
    pub async fn refresh_expiring(&self) -> usize {
        let now = self.clock.now_utc();
        let expiring: Vec<VehicleCredential> = self
            .credentials
            .lock()
            .values()
            .filter(|c| c.expires_within(now, refresh_window()))
            .cloned()
            .collect();

        let mut refreshed = 0;
        for credential in expiring {
            match self.hook.refresh(&credential).await {
                Ok(updated) => {
                    let mut credentials = self.credentials.lock();
                    credentials.insert(updated.vehicle_id.clone(), updated);
                    if let Err(e) = self.persist(&credentials) {
                        tracing::warn!(error = %e, "vault persist after refresh failed");
                    }
                    refreshed += 1;
                }
                Err(reason) => {
                    tracing::warn!(
                        vehicle_id = %credential.vehicle_id,
                        %reason,
                        "proactive token refresh failed"
                    );
                }
            }
        }
        refreshed
    }

    /// Atomic write: temp file in the same directory, fsync, rename.
    fn persist(&self, credentials: &BTreeMap<String, VehicleCredential>) -> Result<(), VaultError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        let encoded = serde_json::to_vec_pretty(credentials)
            .map_err(|e| VaultError::Corrupt(e.to_string()))?;
        {
            use std::io::Write;
            let mut file = std::fs::File::create(&temp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// Periodic refresh loop; owned by the runtime root, cancelled on shutdown.
pub async fn run_refresh_task<C: Clock>(vault: Arc<CredentialVault<C>>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let refreshed = vault.refresh_expiring().await;
                if refreshed > 0 {
                    tracing::info!(refreshed, "refreshed expiring vehicle tokens");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
