//! Filter configuration supplied when a session starts
//!
//! A [`FilterConfig`] is fixed for the lifetime of a session. Zero durations
//! and non-positive distances switch the matching rule off, so the default
//! configuration delivers every fix the sensor produces.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// How eagerly fixes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMode {
    /// Every fix that passes the quality checks
    All,
    /// Only fixes that moved far enough, spaced far enough apart in time
    #[default]
    Significant,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::All => "ALL",
            DeliveryMode::Significant => "SIGNIFICANT",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(DeliveryMode::All)
        } else if s.eq_ignore_ascii_case("significant") {
            Ok(DeliveryMode::Significant)
        } else {
            Err(ConfigError::UnknownMode(s.to_string()))
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single listening session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Reject fixes whose accuracy radius is larger than this many meters
    /// Default: 0.0 (disabled)
    pub accuracy_filter: f64,

    /// Minimum displacement in meters from the last accepted fix
    /// Default: 0.0 (disabled)
    pub distance_filter: f64,

    /// Reject fixes older than this when they arrive
    /// Default: zero (disabled)
    pub age_filter: Duration,

    /// Minimum time between two deliveries
    /// Default: zero (disabled)
    pub min_interval: Duration,

    /// Delivery mode requested by the caller
    /// Default: Significant
    pub mode: DeliveryMode,

    /// Stop the session after this long without an accepted fix
    /// Default: zero (never)
    pub timeout: Duration,

    /// Skip distance and interval throttling
    /// Default: false
    pub send_all_updates: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            accuracy_filter: 0.0,
            distance_filter: 0.0,
            age_filter: Duration::ZERO,
            min_interval: Duration::ZERO,
            mode: DeliveryMode::Significant,
            timeout: Duration::ZERO,
            send_all_updates: false,
        }
    }
}

impl FilterConfig {
    /// Create a new FilterConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reasonably fresh fix, unthrottled
    pub fn continuous() -> Self {
        Self {
            age_filter: Duration::from_secs(10),
            ..Default::default()
        }
        .with_mode(DeliveryMode::All)
    }

    /// Battery-friendly preset for coarse tracking
    pub fn significant() -> Self {
        Self {
            accuracy_filter: 100.0,
            distance_filter: 50.0,
            age_filter: Duration::from_secs(30),
            min_interval: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.accuracy_filter.is_nan() {
            return Err(ConfigError::NotFinite {
                field: "accuracy_filter",
            });
        }

        if !self.distance_filter.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "distance_filter",
            });
        }

        Ok(())
    }

    /// Whether the session should arm a timeout at all
    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }

    // Builder pattern methods for fluent configuration

    pub fn with_accuracy_filter(mut self, meters: f64) -> Self {
        self.accuracy_filter = meters;
        self
    }

    pub fn with_distance_filter(mut self, meters: f64) -> Self {
        self.distance_filter = meters;
        self
    }

    pub fn with_age_filter(mut self, age: Duration) -> Self {
        self.age_filter = age;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delivery mode; `All` also turns on `send_all_updates`.
    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self.send_all_updates = mode == DeliveryMode::All;
        self
    }

    pub fn with_send_all_updates(mut self, enabled: bool) -> Self {
        self.send_all_updates = enabled;
        self
    }
}
