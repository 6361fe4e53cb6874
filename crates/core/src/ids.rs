// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! Generated ids carry a 4-character type prefix followed by a 16-character
//! nanoid. Application ids are chosen by the deploying client and are kept
//! as-is after validation.

use serde::{Deserialize, Serialize};

/// Length of the random payload in generated ids.
const NANOID_LEN: usize = 16;

/// Define a newtype id wrapper with a type prefix.
///
/// Generates `new()` for random generation, `from_string()`, `as_str()`,
/// `Display`, `From<&str>`/`From<String>`, and `AsRef<str>`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random id with the type prefix.
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(NANOID_LEN)))
            }

            /// Wrap an existing string (parsing, deserialization).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Fresh identifier minted on each start of an application.
    pub struct ExecutionId("exe-");
}

define_id! {
    /// Identifier for a log or signal subscription.
    pub struct SubscriptionId("sub-");
}

define_id! {
    /// Identifier for a connected client (local socket or remote token).
    pub struct ClientId("cli-");
}

/// Caller-chosen application identifier.
///
/// Opaque and stable; validated on deploy so it is safe to embed in paths
/// and container labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Validate and wrap a caller-supplied id.
    ///
    /// Accepts 1..=128 characters of `[A-Za-z0-9._-]`. Anything else would
    /// leak into filesystem paths and docker labels.
    pub fn parse(id: &str) -> Result<Self, String> {
        if id.is_empty() || id.len() > 128 {
            return Err(format!("application id must be 1..=128 characters, got {}", id.len()));
        }
        if !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-') {
            return Err(format!("application id contains invalid characters: {:?}", id));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
