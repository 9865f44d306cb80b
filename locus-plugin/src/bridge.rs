//! Outgoing side of the plugin: how session events reach the host

use std::sync::{mpsc, Arc};

use locus_stream::{DeliveredFix, FixConsumer, OwnerId, SensorError, SessionId, StopReason};
use tracing::{debug, trace};

use crate::message::PluginEvent;

/// Delivers plugin events to the host view that owns the session
pub trait HostBridge: Send + Sync {
    fn send(&self, owner: OwnerId, event: PluginEvent);
}

/// Bridge that forwards every event into a channel
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    sender: mpsc::Sender<(OwnerId, PluginEvent)>,
}

impl ChannelBridge {
    pub fn new() -> (Self, mpsc::Receiver<(OwnerId, PluginEvent)>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl HostBridge for ChannelBridge {
    fn send(&self, owner: OwnerId, event: PluginEvent) {
        if self.sender.send((owner, event)).is_err() {
            debug!("Host receiver dropped, discarding event for {}", owner);
        }
    }
}

/// Session consumer that turns session callbacks into host events
pub(crate) struct HostConsumer {
    owner: OwnerId,
    bridge: Arc<dyn HostBridge>,
}

impl HostConsumer {
    pub(crate) fn new(owner: OwnerId, bridge: Arc<dyn HostBridge>) -> Self {
        Self { owner, bridge }
    }
}

impl FixConsumer for HostConsumer {
    fn on_fix(&self, fix: DeliveredFix) {
        trace!("{} delivering fix #{} to {}", fix.session_id, fix.sequence, self.owner);
        self.bridge.send(self.owner, PluginEvent::changed(&fix));
    }

    fn on_error(&self, error: &SensorError) {
        self.bridge.send(self.owner, PluginEvent::error(error));
    }

    fn on_stopped(&self, session: SessionId, reason: StopReason) {
        // Only a timeout is news to the host; the other stops were its own doing
        // or were already reported through on_error
        if reason == StopReason::Timeout {
            debug!("{} timed out for {}", session, self.owner);
            self.bridge.send(self.owner, PluginEvent::LocationTimeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_filter::{RawFix, Timestamp};

    fn consumer() -> (HostConsumer, mpsc::Receiver<(OwnerId, PluginEvent)>) {
        let (bridge, events) = ChannelBridge::new();
        (HostConsumer::new(OwnerId::new(9), Arc::new(bridge)), events)
    }

    #[test]
    fn test_fix_becomes_location_changed() {
        let (consumer, events) = consumer();
        consumer.on_fix(DeliveredFix {
            session_id: SessionId::next(),
            sequence: 1,
            delivered_at: Timestamp::from_millis(10),
            fix: RawFix::new(1.0, 2.0, 3.0, Timestamp::from_millis(10)),
        });

        let (owner, event) = events.try_recv().unwrap();
        assert_eq!(owner, OwnerId::new(9));
        assert_eq!(event.name(), "onLocationChanged");
    }

    #[test]
    fn test_only_timeout_stop_is_reported() {
        let (consumer, events) = consumer();
        let session = SessionId::next();

        consumer.on_stopped(session, StopReason::Explicit);
        consumer.on_stopped(session, StopReason::Superseded);
        consumer.on_stopped(session, StopReason::SensorFailure);
        assert!(events.try_recv().is_err());

        consumer.on_stopped(session, StopReason::Timeout);
        assert_eq!(events.try_recv().unwrap().1, PluginEvent::LocationTimeout);
    }

    #[test]
    fn test_sensor_error_code() {
        let (consumer, events) = consumer();
        consumer.on_error(&SensorError::Unavailable("no signal".to_string()));

        match events.try_recv().unwrap().1 {
            PluginEvent::LocationError { code, message } => {
                assert_eq!(code, "unavailable");
                assert!(message.contains("no signal"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (consumer, events) = consumer();
        drop(events);
        consumer.on_stopped(SessionId::next(), StopReason::Timeout);
    }
}
