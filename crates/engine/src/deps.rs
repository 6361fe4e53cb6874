// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Python dependency materialization.
//!
//! Packages are installed into a per-app cache directory with a short-lived
//! installer container (`pip install --target`), then bind-mounted
//! read-only into the application container. A cache whose requirements
//! have not changed is reused without reinstalling.

use std::path::PathBuf;
use std::sync::Arc;

use sdv_core::{AppId, Application, Dependency, DependencyKind, RuntimeError};
use sdv_storage::Store;

use crate::docker::ContainerEngine;
use crate::paths::StoragePaths;

/// Image used for the installer container.
const PIP_IMAGE: &str = "python:3.11-slim";
/// Requirements manifest kept next to the installed packages.
const MANIFEST: &str = "requirements.txt";

/// Ensure the app's python dependencies are installed.
///
/// Returns the cache directory to mount, or `None` when the app declares no
/// dependencies. Declared packages are recorded in the store either way.
pub async fn materialize(
    engine: &Arc<dyn ContainerEngine>,
    store: &Store,
    paths: &StoragePaths,
    app: &Application,
) -> Result<Option<PathBuf>, RuntimeError> {
    record_declared(store, app)?;
    if app.python_deps.is_empty() {
        return Ok(None);
    }

    let cache_dir = paths.deps_dir(&app.id);
    let manifest = cache_dir.join(MANIFEST);
    let wanted = app.python_deps.join("\n");

    if let Ok(existing) = std::fs::read_to_string(&manifest) {
        if existing == wanted {
            tracing::debug!(app_id = %app.id, "dependency cache hit");
            return Ok(Some(cache_dir));
        }
        // Requirements changed: re-resolve from scratch.
        let _ = std::fs::remove_dir_all(&cache_dir);
    }

    std::fs::create_dir_all(&cache_dir)
        .map_err(|e| RuntimeError::Transient(format!("dependency dir: {e}")))?;

    install(engine, &app.id, &cache_dir, &app.python_deps).await?;

    std::fs::write(&manifest, wanted)
        .map_err(|e| RuntimeError::Transient(format!("dependency manifest: {e}")))?;
    Ok(Some(cache_dir))
}

fn record_declared(store: &Store, app: &Application) -> Result<(), RuntimeError> {
    for spec in &app.python_deps {
        let (name, version_spec) = split_specifier(spec);
        store.record_dependency(&Dependency {
            app_id: app.id.clone(),
            kind: DependencyKind::PythonPkg,
            name: name.to_string(),
            version_spec: version_spec.map(str::to_string),
            resolved_version: None,
        })?;
    }
    for path in &app.vehicle_signals {
        store.record_dependency(&Dependency {
            app_id: app.id.clone(),
            kind: DependencyKind::VehicleSignal,
            name: path.clone(),
            version_spec: None,
            resolved_version: None,
        })?;
    }
    Ok(())
}

async fn install(
    engine: &Arc<dyn ContainerEngine>,
    app_id: &AppId,
    cache_dir: &std::path::Path,
    specs: &[String],
) -> Result<(), RuntimeError> {
    let mut tokens: Vec<String> = vec![
        "run".to_string(),
        "--rm".to_string(),
        "-v".to_string(),
        format!("{}:/deps", cache_dir.display()),
        PIP_IMAGE.to_string(),
        "pip".to_string(),
        "install".to_string(),
        "--no-cache-dir".to_string(),
        "--target".to_string(),
        "/deps".to_string(),
    ];
    tokens.extend(specs.iter().cloned());

    tracing::info!(%app_id, packages = specs.len(), "installing python dependencies");
    engine.run_cli(&tokens).await.map_err(|e| {
        RuntimeError::Engine(format!("dependency install for {app_id} failed: {e}"))
    })?;
    Ok(())
}

/// Split `requests>=2.31` into name and version spec.
fn split_specifier(spec: &str) -> (&str, Option<&str>) {
    let boundary = spec
        .find(|c: char| ['=', '>', '<', '~', '!', '['].contains(&c))
        .unwrap_or(spec.len());
    let (name, rest) = spec.split_at(boundary);
    let name = name.trim();
    let rest = rest.trim();
    (name, (!rest.is_empty()).then_some(rest))
}

#[cfg(test)]
#[path = "deps_tests.rs"]
mod tests;
