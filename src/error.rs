//! Error types for the inkframe core.

use thiserror::Error;

/// Result type for core operations
pub type InkframeResult<T> = Result<T, InkframeError>;

/// Error kinds surfaced by the core components
#[derive(Error, Debug)]
pub enum InkframeError {
    /// Rejected input: settings validation, slot bounds, malformed requests
    #[error("Validation error: {0}")]
    Validation(String),

    /// Plugin id not present in the registry
    #[error("Plugin {0} not found")]
    PluginNotFound(String),

    /// Instance id not present in the instance store
    #[error("Instance {0} not found")]
    InstanceNotFound(String),

    /// JSON store save failure; in-memory state has been rolled back
    #[error("Store persistence error: {0}")]
    StorePersistence(String),

    /// Plugin image generation failed
    #[error("Plugin execution failed: {0}")]
    PluginExecution(String),

    /// Panel driver failure
    #[error("Display driver error: {0}")]
    Display(String),

    /// Fatal boot-time configuration problem
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for InkframeError {
    fn from(err: std::io::Error) -> Self {
        InkframeError::StorePersistence(err.to_string())
    }
}
