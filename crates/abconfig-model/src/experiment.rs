//! Experiments and their scopes

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record-store identifier of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(pub i64);

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle boundary over which a selection holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Re-rolled on every request
    Request,
    /// Rolled once per session, then replayed
    Session,
    /// Stable hash of address and user agent
    Device,
    /// Resolved at early boot, override first, then a request-style draw
    #[serde(alias = "beforesession")]
    AfterConfig,
}

impl Scope {
    /// Stored name of the scope
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Session => "session",
            Self::Device => "device",
            Self::AfterConfig => "afterconfig",
        }
    }

    /// Whether admins are skipped unless the experiment is admin-enabled
    #[inline]
    #[must_use]
    pub const fn admin_immune(self) -> bool {
        !matches!(self, Self::Device)
    }

    /// Whether conditions may restrict themselves to listed user ids
    #[inline]
    #[must_use]
    pub const fn user_targeting(self) -> bool {
        !matches!(self, Self::Device)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "request" => Ok(Self::Request),
            "session" => Ok(Self::Session),
            "device" => Ok(Self::Device),
            "afterconfig" | "beforesession" => Ok(Self::AfterConfig),
            other => Err(ModelError::UnknownScope(other.to_string())),
        }
    }
}

/// A named feature-flag test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Record id
    pub id: ExperimentId,
    /// Human-readable name
    pub name: String,
    /// Unique alphanumeric key
    pub shortname: String,
    /// Selection lifecycle
    pub scope: Scope,
    /// Whether the experiment fires at all
    #[serde(default)]
    pub enabled: bool,
    /// Whether admins take part in admin-immune scopes
    #[serde(default)]
    pub admin_enabled: bool,
    /// Device-scope salt in `0..=99`
    #[serde(default)]
    pub numeric_offset: u8,
}

/// Check a shortname is non-empty ASCII alphanumeric
///
/// # Errors
/// Returns [`ModelError::InvalidShortname`] otherwise
pub fn validate_shortname(shortname: &str) -> Result<()> {
    if shortname.is_empty() || !shortname.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ModelError::InvalidShortname(shortname.to_string()));
    }
    Ok(())
}

/// Check a numeric offset lies in `0..=99`
///
/// # Errors
/// Returns [`ModelError::InvalidOffset`] otherwise
pub fn validate_offset(offset: i64) -> Result<u8> {
    match u8::try_from(offset) {
        Ok(value) if value < 100 => Ok(value),
        _ => Err(ModelError::InvalidOffset(offset)),
    }
}
