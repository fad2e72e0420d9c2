//! Error types for the data model

/// Errors raised while building or decoding model values
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Verb recognised but the argument count is wrong
    #[error("malformed {verb} command: expected {expected} fields, found {found}")]
    MalformedCommand {
        /// The recognised verb
        verb: String,
        /// Number of comma-separated fields the verb needs
        expected: usize,
        /// Number of fields actually present
        found: usize,
    },

    /// Stored command list is not a JSON array of strings
    #[error("invalid command list: {0}")]
    InvalidCommandList(#[from] serde_json::Error),

    /// Shortname is empty or contains non-alphanumeric characters
    #[error("invalid shortname '{0}': must be non-empty and alphanumeric")]
    InvalidShortname(String),

    /// Numeric offset outside `0..=99`
    #[error("numeric offset {0} out of range 0..=99")]
    InvalidOffset(i64),

    /// Scope name not recognised
    #[error("unknown scope '{0}'")]
    UnknownScope(String),
}

impl ModelError {
    /// Create malformed command error
    pub fn malformed(verb: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::MalformedCommand {
            verb: verb.into(),
            expected,
            found,
        }
    }
}

/// Result alias for model operations
pub type Result<T, E = ModelError> = std::result::Result<T, E>;
