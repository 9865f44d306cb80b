//! Observer traits between a session and the code around it
//!
//! A session talks to two parties: the [`FixConsumer`] that receives accepted
//! fixes, and a [`StopListener`] (normally the registry) that learns when the
//! session ends.

use tokio::sync::mpsc;

use crate::error::SensorError;
use crate::types::{DeliveredFix, SessionId, StopNotice, StopReason};

/// Receives the output of a listener session
///
/// Calls for one session never overlap and arrive in order. `on_stopped` is
/// the last call a session makes.
pub trait FixConsumer: Send + Sync {
    /// A fix passed the filters
    fn on_fix(&self, fix: DeliveredFix);

    /// The sensor failed; the session stops right after this call
    fn on_error(&self, _error: &SensorError) {}

    /// The session stopped. Called once, only for sessions that started.
    fn on_stopped(&self, _session: SessionId, _reason: StopReason) {}
}

/// Receives the single stop notification of each started session
pub trait StopListener: Send + Sync {
    fn on_session_stopped(&self, notice: StopNotice);
}

impl StopListener for mpsc::UnboundedSender<StopNotice> {
    fn on_session_stopped(&self, notice: StopNotice) {
        if self.send(notice).is_err() {
            tracing::debug!("Stop notice for {} dropped, receiver gone", notice.session_id);
        }
    }
}

/// Everything a [`ChannelConsumer`] forwards
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Fix(DeliveredFix),
    Error(SensorError),
    Stopped {
        session_id: SessionId,
        reason: StopReason,
    },
}

/// A consumer that forwards every callback into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelConsumer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Session event dropped, receiver gone");
        }
    }
}

impl FixConsumer for ChannelConsumer {
    fn on_fix(&self, fix: DeliveredFix) {
        self.forward(SessionEvent::Fix(fix));
    }

    fn on_error(&self, error: &SensorError) {
        self.forward(SessionEvent::Error(error.clone()));
    }

    fn on_stopped(&self, session_id: SessionId, reason: StopReason) {
        self.forward(SessionEvent::Stopped { session_id, reason });
    }
}
