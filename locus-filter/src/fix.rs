//! Raw position fixes and the wall-clock timestamps they carry.

use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wall-clock instant with millisecond resolution, counted from the Unix epoch.
///
/// Fix timestamps come from the sensor's clock, so ages and intervals are
/// measured on this scale rather than on a monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the Unix epoch
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        let delta = self.0.saturating_sub(earlier.0);
        if delta <= 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(delta as u64)
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let millis = i64::try_from(rhs.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A single position sample as reported by the sensor.
///
/// Fixes are plain values: the sensor produces them and nothing downstream
/// mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
    /// Altitude in meters, when the sensor reports one
    pub altitude: Option<f64>,
    /// Ground speed in meters per second
    pub speed: Option<f64>,
    /// Course over ground in degrees from true north
    pub heading: Option<f64>,
    /// When the sensor took the sample
    pub timestamp: Timestamp,
}

impl RawFix {
    /// Create a fix with the mandatory fields
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: Timestamp) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            speed: None,
            heading: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Great-circle distance to another fix in meters
    pub fn distance_to(&self, other: &RawFix) -> f64 {
        crate::geo::haversine_distance_m(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}
