//! Core types for the locus-stream crate.

use std::sync::atomic::{AtomicU64, Ordering};

use locus_filter::{RawFix, Timestamp};
use serde::{Deserialize, Serialize};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier for whoever owns a session (a view, controller, tab...)
///
/// The registry only stores this token, never the owner itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(u64);

impl OwnerId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// Process-unique identifier of one listener session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next unused session ID
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a listener session. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The owner asked for it
    Explicit,
    /// No fix was accepted before the deadline
    Timeout,
    /// A newer session for the same owner replaced it
    Superseded,
    /// The sensor reported a failure or its stream ended
    SensorFailure,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Explicit => write!(f, "explicit stop"),
            StopReason::Timeout => write!(f, "timeout"),
            StopReason::Superseded => write!(f, "superseded"),
            StopReason::SensorFailure => write!(f, "sensor failure"),
        }
    }
}

/// Sent exactly once when a started session stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopNotice {
    pub session_id: SessionId,
    pub owner: OwnerId,
    pub reason: StopReason,
}

/// A fix that passed the session's filters, as handed to the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredFix {
    /// Session that delivered the fix
    pub session_id: SessionId,
    /// 1 for the first delivery of a session, then strictly increasing
    pub sequence: u64,
    /// When the session accepted the fix
    pub delivered_at: Timestamp,
    /// The fix itself, unmodified
    pub fix: RawFix,
}
