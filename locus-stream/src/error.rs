//! Error types for the locus-stream crate.

use locus_filter::ConfigError;

use crate::types::SessionState;

/// Failures reported by the positioning sensor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    /// The user or platform refused location access
    #[error("Location authorization denied")]
    AuthorizationDenied,

    /// The sensor could not produce fixes
    #[error("Location sensor unavailable: {0}")]
    Unavailable(String),
}

impl SensorError {
    /// Short machine-readable code for host applications
    pub fn code(&self) -> &'static str {
        match self {
            SensorError::AuthorizationDenied => "denied",
            SensorError::Unavailable(_) => "unavailable",
        }
    }
}

/// Errors from listener session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation is not valid in the session's current state
    #[error("Cannot {operation} a session in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The sensor refused or failed the subscription
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
}

/// Errors from session registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The filter configuration was rejected before any session was created
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Invalid registry configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Starting the session failed
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Too many owners have an active session
    #[error("Registry full: {max_sessions} sessions already active")]
    RegistryFull { max_sessions: usize },

    /// The registry no longer accepts new sessions
    #[error("Registry has been shut down")]
    ShutDown,
}

/// Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result type for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_display() {
        assert_eq!(
            SensorError::AuthorizationDenied.to_string(),
            "Location authorization denied"
        );
        assert_eq!(
            SensorError::Unavailable("gps off".to_string()).to_string(),
            "Location sensor unavailable: gps off"
        );
        assert_eq!(SensorError::AuthorizationDenied.code(), "denied");
        assert_eq!(SensorError::Unavailable(String::new()).code(), "unavailable");
    }

    #[test]
    fn test_session_error_display() {
        let error = SessionError::InvalidState {
            operation: "start",
            state: SessionState::Running,
        };
        assert_eq!(error.to_string(), "Cannot start a session in state Running");
    }

    #[test]
    fn test_error_conversion_chain() {
        let registry_error: RegistryError = SessionError::from(SensorError::AuthorizationDenied).into();
        match registry_error {
            RegistryError::Session(SessionError::Sensor(SensorError::AuthorizationDenied)) => {}
            other => panic!("Expected sensor error, got {:?}", other),
        }

        let registry_error: RegistryError = ConfigError::Negative {
            field: "interval",
            value: -1,
        }
        .into();
        assert!(registry_error.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_registry_error_display() {
        let error = RegistryError::RegistryFull { max_sessions: 4 };
        assert_eq!(error.to_string(), "Registry full: 4 sessions already active");
        assert_eq!(RegistryError::ShutDown.to_string(), "Registry has been shut down");
    }
}
