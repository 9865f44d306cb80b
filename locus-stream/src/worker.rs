//! Per-session task that serializes everything a session reacts to
//!
//! Stop commands, timeout expiry and sensor events are three independent
//! sources. One task per session selects over them and applies them to the
//! [`ListenerSession`] one at a time, commands first, so a stop takes effect
//! before any fix queued behind it.

use std::sync::Arc;

use futures::StreamExt;
use locus_filter::FilterConfig;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::consumer::FixConsumer;
use crate::error::{SensorError, SessionResult};
use crate::sensor::{SensorEvent, SensorSubscription};
use crate::session::ListenerSession;
use crate::types::{OwnerId, SessionId, SessionState, StopReason};

/// Commands sent from a [`SessionHandle`] to the session task
#[derive(Debug)]
enum Command {
    Stop {
        reason: StopReason,
        /// Completed once the session is stopped and has notified
        ack: Option<oneshot::Sender<()>>,
    },
}

/// Cloneable handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    owner: OwnerId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Stop the session and wait until it has released the sensor and sent
    /// its stop notification
    ///
    /// A no-op for a session that already stopped.
    pub async fn stop(&self, reason: StopReason) {
        let (ack, done) = oneshot::channel();
        if self
            .commands
            .send(Command::Stop {
                reason,
                ack: Some(ack),
            })
            .is_err()
        {
            return;
        }
        // Dropped ack means the task ended on its own first
        let _ = done.await;
    }

    /// Ask the session to stop without waiting for it
    pub fn request_stop(&self, reason: StopReason) {
        let _ = self.commands.send(Command::Stop { reason, ack: None });
    }

    /// Wait until the session reaches `Stopped`
    pub async fn stopped(&self) {
        let mut state = self.state.clone();
        // Err means the session task is gone, which only happens after Stopped
        let _ = state.wait_for(|s| *s == SessionState::Stopped).await;
    }
}

/// Start `session` and hand it to a dedicated task
pub(crate) async fn spawn_session(
    mut session: ListenerSession,
    config: FilterConfig,
    consumer: Arc<dyn FixConsumer>,
) -> SessionResult<SessionHandle> {
    let subscription = session.start(config, consumer).await?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        id: session.id(),
        owner: session.owner(),
        commands: command_tx,
        state: session.watch_state(),
    };

    tokio::spawn(run_session(session, subscription, command_rx));

    Ok(handle)
}

/// Main loop of a session task
async fn run_session(
    mut session: ListenerSession,
    mut fixes: SensorSubscription,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        let deadline = session.deadline();

        tokio::select! {
            biased;

            command = commands.recv() => {
                match command {
                    Some(Command::Stop { reason, ack }) => {
                        session.stop(reason);
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                    }
                    // Every handle is gone, nobody can stop us later
                    None => {
                        session.stop(StopReason::Explicit);
                    }
                }
                break;
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debug!("{} reached its deadline", session.id());
                session.on_timeout();
                break;
            }

            event = fixes.next() => {
                match event {
                    Some(SensorEvent::Fix(fix)) => {
                        session.on_raw_fix(fix);
                    }
                    Some(SensorEvent::Failure(error)) => {
                        session.on_sensor_failure(error);
                        break;
                    }
                    None => {
                        session.on_sensor_failure(SensorError::Unavailable(
                            "sensor stream ended".to_string(),
                        ));
                        break;
                    }
                }
            }
        }
    }

    debug!("{} task finished", session.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::consumer::{ChannelConsumer, SessionEvent};
    use crate::sensor::MockSensor;
    use crate::types::StopNotice;
    use locus_filter::{RawFix, Timestamp};
    use std::time::Duration;

    struct Harness {
        sensor: Arc<MockSensor>,
        clock: ManualClock,
        notices: mpsc::UnboundedReceiver<StopNotice>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        handle: SessionHandle,
    }

    async fn spawn_with(config: FilterConfig) -> Harness {
        let sensor = Arc::new(MockSensor::new());
        let clock = ManualClock::new(Timestamp::from_millis(50_000));
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let (consumer, events) = ChannelConsumer::new();

        let session = ListenerSession::new(
            OwnerId::new(42),
            sensor.clone(),
            Arc::new(clock.clone()),
            Arc::new(notice_tx),
        );
        let handle = spawn_session(session, config, Arc::new(consumer)).await.unwrap();

        Harness {
            sensor,
            clock,
            notices,
            events,
            handle,
        }
    }

    fn fix(clock: &ManualClock) -> RawFix {
        RawFix::new(0.0, 0.0, 5.0, clock.now())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_fixes() {
        let mut h = spawn_with(FilterConfig::default().with_timeout(Duration::from_millis(5_000))).await;

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        h.handle.stopped().await;

        let notice = h.notices.recv().await.unwrap();
        assert_eq!(notice.reason, StopReason::Timeout);
        assert_eq!(notice.session_id, h.handle.id());
        assert!(h.notices.try_recv().is_err());

        assert_eq!(
            h.events.recv().await.unwrap(),
            SessionEvent::Stopped {
                session_id: h.handle.id(),
                reason: StopReason::Timeout
            }
        );
        assert_eq!(h.sensor.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_timed_out_before_deadline() {
        let h = spawn_with(FilterConfig::default().with_timeout(Duration::from_millis(5_000))).await;

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        tokio::task::yield_now().await;

        assert!(h.handle.is_running());
        assert_eq!(h.sensor.active_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_fixes_keep_session_alive() {
        let mut h = spawn_with(FilterConfig::default().with_timeout(Duration::from_secs(5))).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            h.sensor.push_fix(fix(&h.clock));
            let event = h.events.recv().await.unwrap();
            assert!(matches!(event, SessionEvent::Fix(_)));
        }
        assert!(h.handle.is_running());

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        h.handle.stopped().await;
        assert_eq!(h.notices.recv().await.unwrap().reason, StopReason::Timeout);
    }

    #[tokio::test]
    async fn test_fixes_delivered_in_arrival_order() {
        let mut h = spawn_with(FilterConfig::continuous()).await;

        for i in 0..20 {
            let fix = RawFix::new(i as f64 * 0.001, 0.0, 5.0, h.clock.now());
            h.sensor.push_fix(fix);
        }

        for expected in 1..=20u64 {
            match h.events.recv().await.unwrap() {
                SessionEvent::Fix(delivered) => {
                    assert_eq!(delivered.sequence, expected);
                    assert_eq!(delivered.fix.latitude, (expected - 1) as f64 * 0.001);
                }
                other => panic!("Expected fix, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_stop_waits_for_notification() {
        let mut h = spawn_with(FilterConfig::default()).await;

        h.handle.stop(StopReason::Explicit).await;

        // Notification is already queued when stop returns
        assert_eq!(h.notices.try_recv().unwrap().reason, StopReason::Explicit);
        assert_eq!(h.handle.state(), SessionState::Stopped);
        assert_eq!(h.sensor.active_subscriptions(), 0);

        // Stopping again is a no-op
        h.handle.stop(StopReason::Explicit).await;
        h.handle.request_stop(StopReason::Superseded);
        tokio::task::yield_now().await;
        assert!(h.notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sensor_failure_event_stops_session() {
        let mut h = spawn_with(FilterConfig::default()).await;

        h.sensor.push_failure(SensorError::AuthorizationDenied);
        h.handle.stopped().await;

        assert_eq!(
            h.events.recv().await.unwrap(),
            SessionEvent::Error(SensorError::AuthorizationDenied)
        );
        assert_eq!(h.notices.recv().await.unwrap().reason, StopReason::SensorFailure);
        assert_eq!(h.sensor.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_ended_stream_counts_as_unavailable() {
        let mut h = spawn_with(FilterConfig::default()).await;

        h.sensor.end_streams();
        h.handle.stopped().await;

        match h.events.recv().await.unwrap() {
            SessionEvent::Error(SensorError::Unavailable(_)) => {}
            other => panic!("Expected unavailable error, got {:?}", other),
        }
        assert_eq!(h.notices.recv().await.unwrap().reason, StopReason::SensorFailure);
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_session() {
        let Harness {
            sensor,
            mut notices,
            handle,
            ..
        } = spawn_with(FilterConfig::default()).await;

        drop(handle);

        assert_eq!(notices.recv().await.unwrap().reason, StopReason::Explicit);
        assert_eq!(sensor.active_subscriptions(), 0);
    }
}
