//! Accept/reject decision for a single candidate fix
//!
//! Rules run in a fixed order and the first one that fails names the
//! rejection:
//!
//! 1. age, against the arrival time
//! 2. reported accuracy
//! 3. `send_all_updates` short-circuits to accept
//! 4. displacement from the last accepted fix
//! 5. time since the last delivery

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::fix::{RawFix, Timestamp};

/// Why a fix was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Older than the age filter when it arrived
    Stale,
    /// Accuracy radius larger than the accuracy filter
    Inaccurate,
    /// Closer than the distance filter to the last accepted fix
    TooClose,
    /// Arrived before the minimum interval since the last delivery elapsed
    TooSoon,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Stale => write!(f, "stale"),
            RejectReason::Inaccurate => write!(f, "inaccurate"),
            RejectReason::TooClose => write!(f, "too close"),
            RejectReason::TooSoon => write!(f, "too soon"),
        }
    }
}

/// Outcome of [`evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Decide whether `candidate` should be delivered.
///
/// `last_accepted` and `last_delivery` describe the session's previous
/// delivery, `now` is when the candidate arrived.
pub fn evaluate(
    candidate: &RawFix,
    last_accepted: Option<&RawFix>,
    last_delivery: Option<Timestamp>,
    config: &FilterConfig,
    now: Timestamp,
) -> FilterDecision {
    if !config.age_filter.is_zero()
        && now.saturating_duration_since(candidate.timestamp) > config.age_filter
    {
        return FilterDecision::Reject(RejectReason::Stale);
    }

    // NaN accuracy never satisfies an enabled filter
    if config.accuracy_filter > 0.0
        && (candidate.accuracy.is_nan() || candidate.accuracy > config.accuracy_filter)
    {
        return FilterDecision::Reject(RejectReason::Inaccurate);
    }

    if config.send_all_updates {
        return FilterDecision::Accept;
    }

    if config.distance_filter > 0.0 {
        if let Some(last) = last_accepted {
            if candidate.distance_to(last) < config.distance_filter {
                return FilterDecision::Reject(RejectReason::TooClose);
            }
        }
    }

    if !config.min_interval.is_zero() {
        if let Some(last) = last_delivery {
            if now.saturating_duration_since(last) < config.min_interval {
                return FilterDecision::Reject(RejectReason::TooSoon);
            }
        }
    }

    FilterDecision::Accept
}
