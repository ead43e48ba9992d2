//! Identifier newtypes.
//!
//! [`DeviceId`] is derived from the physical source (MAC, serial, host…) by
//! the discovery backend, so repeated scans of the same device always map to
//! the same registry entry. [`MessageId`] is a random UUID used to correlate
//! bus requests with their responses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable, opaque identifier of a physical device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an identifier reported by a discovery backend.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an identifier from a scanner name and a source-local key,
    /// e.g. `("virtual", "AA:BB")` → `virtual:aa:bb`.
    #[must_use]
    pub fn scoped(scope: &str, key: &str) -> Self {
        Self(format!("{scope}:{}", key.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a bus [`Message`](crate::message::Message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(uuid::Uuid);

impl Default for MessageId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl MessageId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the inner UUID.
    #[must_use]
    pub fn as_uuid(self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}
