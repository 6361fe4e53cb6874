// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vehicle signal schema.
//!
//! The schema is a nested branch tree with typed leaves, cached at
//! `<storage_root>/vss.json`. Every signal path is validated against it
//! before anything is forwarded to the broker.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::signal::GatewayError;

/// Metadata on a schema leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafMeta {
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One node: either a branch with children or a leaf with metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, SchemaNode>,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<LeafMeta>,
}

/// The loaded signal schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSchema {
    #[serde(flatten)]
    pub roots: BTreeMap<String, SchemaNode>,
}

impl SignalSchema {
    /// Load the schema from its JSON cache file. A missing file yields an
    /// empty schema, which rejects every path.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "signal schema missing, all paths invalid");
                return Ok(Self::default());
            }
            Err(e) => return Err(GatewayError::Io(e)),
        };
        serde_json::from_str(&content)
            .map_err(|e| GatewayError::SchemaInvalid(format!("{}: {e}", path.display())))
    }

    /// Resolve a dotted path to its leaf metadata.
    pub fn resolve(&self, path: &str) -> Result<&LeafMeta, GatewayError> {
        let mut segments = path.split('.');
        let first = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::UnknownPath(path.to_string()))?;

        let mut node = self
            .roots
            .get(first)
            .ok_or_else(|| GatewayError::UnknownPath(path.to_string()))?;
        for segment in segments {
            node = node
                .children
                .get(segment)
                .ok_or_else(|| GatewayError::UnknownPath(path.to_string()))?;
        }
        node.leaf
            .as_ref()
            .ok_or_else(|| GatewayError::NotALeaf(path.to_string()))
    }

    /// Validate a batch of paths, reporting the first offender.
    pub fn validate_all<'a, I>(&self, paths: I) -> Result<(), GatewayError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for path in paths {
            self.resolve(path)?;
        }
        Ok(())
    }

    /// Range-check a numeric write against leaf min/max.
    pub fn validate_value(
        &self,
        path: &str,
        value: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        let leaf = self.resolve(path)?;
        if let (Some(n), Some(min)) = (value.as_f64(), leaf.min) {
            if n < min {
                return Err(GatewayError::OutOfRange(format!("{path}: {n} < min {min}")));
            }
        }
        if let (Some(n), Some(max)) = (value.as_f64(), leaf.max) {
            if n > max {
                return Err(GatewayError::OutOfRange(format!("{path}: {n} > max {max}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
pub(crate) mod tests;
