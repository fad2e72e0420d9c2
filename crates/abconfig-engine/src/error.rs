//! Error types for the evaluation engine

use abconfig_model::ModelError;
use abconfig_store::StoreError;

/// Errors surfaced by the engine
///
/// Command-level failures (precedence rejections, malformed lines) are not
/// errors; they land in an [`ExecutionReport`](crate::ExecutionReport).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Experiment dataset could not be read
    #[error("experiment store: {0}")]
    Store(#[from] StoreError),

    /// Stored data failed to decode
    #[error("model: {0}")]
    Model(#[from] ModelError),

    /// Header emitted after the response headers went out
    #[error("headers already sent, cannot emit `{0}`")]
    HeadersAlreadySent(String),

    /// Settings file unreadable or invalid
    #[error("settings: {0}")]
    Settings(String),
}

impl EngineError {
    /// Create settings error
    #[inline]
    pub fn settings(message: impl Into<String>) -> Self {
        Self::Settings(message.into())
    }
}

/// Result type for engine operations
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
