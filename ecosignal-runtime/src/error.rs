//! Runtime errors

use ecosignal_connectors::ProviderError;
use ecosignal_core::EngineError;
use thiserror::Error;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while loading configuration or starting the driver
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Runtime configuration cannot be used
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}
