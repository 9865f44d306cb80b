use locus_filter::ConfigError;
use thiserror::Error;

use crate::logging::LoggingError;

/// Errors returned to the host by the plugin facade
#[derive(Error, Debug)]
pub enum PluginError {
    /// The host message was not valid JSON or not a known action
    #[error("Failed to parse host message: {0}")]
    Parse(#[from] serde_json::Error),

    /// The start request carried an invalid filter configuration
    #[error("Invalid location request: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The background worker has stopped
    #[error("Location worker is not running")]
    WorkerDisconnected,

    /// Creating or joining the worker failed
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Logging could not be initialized
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
