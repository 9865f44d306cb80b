//! JSON messages exchanged with the host
//!
//! Incoming actions:
//!
//! ```json
//! {"action": "startLocation", "data": {"accuracy": 100, "distance": 50, "age": 30000,
//!                                      "interval": 5000, "mode": "SIGNIFICANT", "timeout": 0}}
//! {"action": "stopLocation"}
//! ```
//!
//! Time values (`age`, `interval`, `timeout`) are milliseconds and distances are
//! meters. Zero disables the corresponding rule.

use std::time::Duration;

use locus_filter::{ConfigError, DeliveryMode, FilterConfig, RawFix};
use locus_stream::{DeliveredFix, SensorError};
use serde::{Deserialize, Serialize};

/// An action requested by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum PluginAction {
    StartLocation(StartRequest),
    StopLocation,
}

impl PluginAction {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Raw start parameters as the host sends them
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    /// Maximum accuracy radius in meters
    pub accuracy: i64,
    /// Minimum displacement in meters
    pub distance: i64,
    /// Maximum fix age in milliseconds
    pub age: i64,
    /// Minimum time between deliveries in milliseconds
    pub interval: i64,
    /// `"ALL"` or `"SIGNIFICANT"`
    pub mode: String,
    /// Milliseconds without an accepted fix before the session stops
    pub timeout: i64,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            accuracy: 0,
            distance: 0,
            age: 0,
            interval: 0,
            mode: DeliveryMode::Significant.as_str().to_string(),
            timeout: 0,
        }
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Negative { field, value })
}

impl TryFrom<StartRequest> for FilterConfig {
    type Error = ConfigError;

    fn try_from(request: StartRequest) -> Result<Self, Self::Error> {
        let accuracy = non_negative("accuracy", request.accuracy)?;
        let distance = non_negative("distance", request.distance)?;
        let age = non_negative("age", request.age)?;
        let interval = non_negative("interval", request.interval)?;
        let timeout = non_negative("timeout", request.timeout)?;
        let mode: DeliveryMode = request.mode.parse()?;

        let config = FilterConfig::new()
            .with_accuracy_filter(accuracy as f64)
            .with_distance_filter(distance as f64)
            .with_age_filter(Duration::from_millis(age))
            .with_min_interval(Duration::from_millis(interval))
            .with_timeout(Duration::from_millis(timeout))
            .with_mode(mode);
        config.validate()?;

        Ok(config)
    }
}

/// Position payload of `onLocationChanged`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Sample time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl From<&RawFix> for LocationPayload {
    fn from(fix: &RawFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            altitude: fix.altitude,
            speed: fix.speed,
            heading: fix.heading,
            timestamp: fix.timestamp.as_millis(),
        }
    }
}

/// An event sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PluginEvent {
    #[serde(rename = "onLocationChanged")]
    LocationChanged {
        sequence: u64,
        location: LocationPayload,
    },

    #[serde(rename = "onLocationTimeout")]
    LocationTimeout,

    #[serde(rename = "onLocationError")]
    LocationError { code: String, message: String },
}

impl PluginEvent {
    pub fn changed(fix: &DeliveredFix) -> Self {
        PluginEvent::LocationChanged {
            sequence: fix.sequence,
            location: LocationPayload::from(&fix.fix),
        }
    }

    pub fn error(error: &SensorError) -> Self {
        PluginEvent::LocationError {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    /// Name of the host callback this event maps to
    pub fn name(&self) -> &'static str {
        match self {
            PluginEvent::LocationChanged { .. } => "onLocationChanged",
            PluginEvent::LocationTimeout => "onLocationTimeout",
            PluginEvent::LocationError { .. } => "onLocationError",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
