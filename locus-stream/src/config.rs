//! Configuration types for the session registry

use crate::error::RegistryError;

/// Configuration for a [`SessionRegistry`](crate::SessionRegistry)
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of owners with an active session
    /// Default: 256
    pub max_sessions: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_sessions: 256 }
    }
}

impl RegistryConfig {
    /// Create a new RegistryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.max_sessions == 0 {
            return Err(RegistryError::Configuration(
                "Max sessions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_sessions, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = RegistryConfig::new().with_max_sessions(0);
        assert!(matches!(
            config.validate(),
            Err(RegistryError::Configuration(_))
        ));
    }
}
