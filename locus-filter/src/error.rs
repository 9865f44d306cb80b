//! Error types for the locus-filter crate.

/// Problems with a filter configuration supplied by a caller.
///
/// Rejection of an individual fix is never an error; see
/// [`RejectReason`](crate::RejectReason) for that.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// An integer parameter that must be zero or positive was negative
    #[error("{field} must not be negative (got {value})")]
    Negative {
        /// Name of the offending parameter
        field: &'static str,
        /// The value that was supplied
        value: i64,
    },

    /// A floating point parameter was NaN or infinite
    #[error("{field} must be a finite number")]
    NotFinite {
        /// Name of the offending parameter
        field: &'static str,
    },

    /// The delivery mode string was not recognised
    #[error("Unknown delivery mode: {0:?} (expected \"ALL\" or \"SIGNIFICANT\")")]
    UnknownMode(String),
}

/// Convenience type alias for Results using ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;
