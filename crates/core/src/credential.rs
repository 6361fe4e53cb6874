// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-vehicle credential records held by the vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials for one vehicle, persisted in the vault file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCredential {
    pub vehicle_id: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl VehicleCredential {
    /// Whether the access token expires within `window` from `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.expires_at <= now + window
    }
}
