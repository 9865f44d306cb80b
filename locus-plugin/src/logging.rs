//! Logging setup for hosts embedding the location plugin
//!
//! Library crates only emit `tracing` events. The host decides whether they
//! go anywhere by calling one of the initializers below once at startup.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// How much the plugin logs, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at info level
    Development,
    /// Verbose output with threads and source locations
    Debug,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(LoggingError::InvalidEnv(format!(
                "LOCUS_LOG_MODE={other}"
            ))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// Call this before creating a [`LocationPlugin`](crate::LocationPlugin) so
/// worker startup is captured too.
///
/// # Environment Variables
///
/// - `LOCUS_LOG_LEVEL`: filter directive, e.g. `debug` or `locus_stream=trace`
/// - `RUST_LOG`: used when `LOCUS_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_names(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `LOCUS_LOG_MODE` (`silent`, `development`, `debug`)
///
/// Unset means silent. An unrecognised value is an error rather than a
/// silent fallback.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("LOCUS_LOG_MODE") {
        Ok(value) => value.parse()?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

/// Build the level filter: `LOCUS_LOG_LEVEL`, then `RUST_LOG`, then the default
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(level) = std::env::var("LOCUS_LOG_LEVEL") {
        EnvFilter::try_new(&level)
            .map_err(|e| LoggingError::InvalidEnv(format!("LOCUS_LOG_LEVEL={level}: {e}")))
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        Ok(EnvFilter::new(rust_log))
    } else {
        Ok(EnvFilter::new(default_level))
    }
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
