//! Protocol versioning.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// signald protocol version, written on the wire as `"v<N>"`.
///
/// Requests carry the version so the daemon picks the matching request
/// schema. Only the major number exists; different numbers are incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub major: u16,
}

impl ProtocolVersion {
    /// Version spoken by this client.
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 0 };

    /// Creates a new ProtocolVersion.
    pub const fn new(major: u16) -> Self {
        Self { major }
    }

    /// Parses a version string like "v0".
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let major = s
            .strip_prefix('v')
            .ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?
            .parse::<u16>()
            .map_err(|_| VersionError::InvalidFormat(s.to_string()))?;

        Ok(Self { major })
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.major)
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProtocolVersion> for String {
    fn from(value: ProtocolVersion) -> Self {
        value.to_string()
    }
}

/// Errors that can occur with version handling.
#[derive(Error, Debug, Clone)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}
