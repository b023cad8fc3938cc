//! Error types for the engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while orchestrating a turn.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine not configured: {0}")]
    NotConfigured(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Gateway returned status {status}: {message}")]
    GatewayStatus { status: u16, message: String },

    #[error("{stage} stage failed: {message}")]
    Stage { stage: &'static str, message: String },

    #[error("Malformed gateway response: {0}")]
    Schema(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a stage failure with a fixed stage name.
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        EngineError::Stage {
            stage,
            message: message.into(),
        }
    }
}
