// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout under the storage root.

use std::path::{Path, PathBuf};

use sdv_core::AppId;

/// Resolved locations of everything the runtime persists.
///
/// ```text
/// <root>/
///   apps.sqlite            store
///   credentials.json       credential vault
///   vss.json               signal schema cache
///   applications/<app>/    per-app working directory
///   dependencies/<app>/    per-app dependency cache (mounted read-only)
///   logs/<app>.log         per-app file sink (rotated)
/// ```
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> PathBuf {
        self.root.join("apps.sqlite")
    }

    pub fn credentials(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    pub fn signal_schema(&self) -> PathBuf {
        self.root.join("vss.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn app_dir(&self, app_id: &AppId) -> PathBuf {
        self.root.join("applications").join(app_id.as_str())
    }

    pub fn deps_dir(&self, app_id: &AppId) -> PathBuf {
        self.root.join("dependencies").join(app_id.as_str())
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.root.join("runtime.log")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("runtime.pid")
    }
}
