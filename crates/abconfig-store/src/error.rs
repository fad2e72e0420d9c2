//! Error types for the experiment store

use abconfig_model::ModelError;

/// Kind of record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Experiment record
    Experiment,
    /// Condition record
    Condition,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Experiment => f.write_str("experiment"),
            Self::Condition => f.write_str("condition"),
        }
    }
}

/// Errors from repository and cache operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Update or delete targeted a missing record
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Record kind
        kind: RecordKind,
        /// Shortname, condset or id that was looked up
        key: String,
    },

    /// Add or rename collided with an existing record
    #[error("{kind} already exists: {key}")]
    AlreadyExists {
        /// Record kind
        kind: RecordKind,
        /// Conflicting shortname or condset
        key: String,
    },

    /// Field or stored value failed validation
    #[error("invalid record: {0}")]
    Invalid(#[from] ModelError),

    /// Underlying record store failed
    #[error("record store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create not-found error
    pub fn not_found(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create already-exists error
    pub fn already_exists(kind: RecordKind, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            key: key.into(),
        }
    }

    /// Whether this is a not-found failure
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a uniqueness failure
    #[inline]
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Result alias for store operations
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
