//! Listener session state machine
//!
//! A [`ListenerSession`] owns one tracking request from start to stop:
//!
//! ```text
//! Idle --start--> Running --stop/timeout/sensor failure--> Stopped
//!   \______________________stop____________________________/
//! ```
//!
//! `Stopped` is terminal. A started session produces exactly one stop
//! notification whichever path stops it; a session that never started
//! produces none.
//!
//! The session itself is synchronous apart from `start`. It is driven by a
//! single task (see [`SessionHandle`](crate::SessionHandle)) which feeds it
//! sensor events and timeout expiries one at a time.

use std::sync::Arc;

use locus_filter::{evaluate, FilterConfig, FilterDecision, RawFix, RejectReason, Timestamp};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::consumer::{FixConsumer, StopListener};
use crate::error::{SensorError, SessionError, SessionResult};
use crate::sensor::{SensorAdapter, SensorHints, SensorSubscription, SubscriptionId};
use crate::types::{DeliveredFix, OwnerId, SessionId, SessionState, StopNotice, StopReason};

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub fixes_received: u64,
    pub fixes_delivered: u64,
    pub rejected_stale: u64,
    pub rejected_inaccurate: u64,
    pub rejected_too_close: u64,
    pub rejected_too_soon: u64,
}

impl SessionStats {
    fn record_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Stale => self.rejected_stale += 1,
            RejectReason::Inaccurate => self.rejected_inaccurate += 1,
            RejectReason::TooClose => self.rejected_too_close += 1,
            RejectReason::TooSoon => self.rejected_too_soon += 1,
        }
    }

    pub fn fixes_rejected(&self) -> u64 {
        self.rejected_stale + self.rejected_inaccurate + self.rejected_too_close + self.rejected_too_soon
    }
}

/// One active tracking request
pub struct ListenerSession {
    id: SessionId,
    owner: OwnerId,
    state: watch::Sender<SessionState>,

    sensor: Arc<dyn SensorAdapter>,
    clock: Arc<dyn Clock>,
    stop_listener: Arc<dyn StopListener>,

    config: FilterConfig,
    consumer: Option<Arc<dyn FixConsumer>>,
    subscription: Option<SubscriptionId>,

    last_accepted: Option<RawFix>,
    last_delivery: Option<Timestamp>,
    /// Armed timeout; only accepted fixes push it back
    deadline: Option<Instant>,
    sequence: u64,
    stats: SessionStats,
}

impl ListenerSession {
    /// Create an idle session for `owner`
    pub fn new(
        owner: OwnerId,
        sensor: Arc<dyn SensorAdapter>,
        clock: Arc<dyn Clock>,
        stop_listener: Arc<dyn StopListener>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);

        Self {
            id: SessionId::next(),
            owner,
            state,
            sensor,
            clock,
            stop_listener,
            config: FilterConfig::default(),
            consumer: None,
            subscription: None,
            last_accepted: None,
            last_delivery: None,
            deadline: None,
            sequence: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Observe state transitions from outside the driving task
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn last_accepted(&self) -> Option<&RawFix> {
        self.last_accepted.as_ref()
    }

    pub fn last_delivery(&self) -> Option<Timestamp> {
        self.last_delivery
    }

    /// When the session times out unless another fix is accepted first
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Subscribe to the sensor and begin accepting fixes
    ///
    /// Only valid once, from `Idle`. If the sensor refuses the subscription
    /// the session ends up `Stopped` without a stop notification and the
    /// sensor error is returned.
    pub async fn start(
        &mut self,
        config: FilterConfig,
        consumer: Arc<dyn FixConsumer>,
    ) -> SessionResult<SensorSubscription> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "start",
                state,
            });
        }

        let subscription = match self.sensor.request_updates(SensorHints::from(&config)).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Sensor refused {} for {}: {}", self.id, self.owner, e);
                self.state.send_replace(SessionState::Stopped);
                return Err(e.into());
            }
        };

        info!(
            "Started {} for {} (mode {}, timeout {:?}, {})",
            self.id,
            self.owner,
            config.mode,
            config.timeout,
            subscription.id()
        );

        self.subscription = Some(subscription.id());
        self.consumer = Some(consumer);
        self.config = config;
        self.rearm_deadline();
        self.state.send_replace(SessionState::Running);

        Ok(subscription)
    }

    /// Run a raw fix through the filters and deliver it if accepted
    ///
    /// Outside `Running` this is a no-op and returns `None`.
    pub fn on_raw_fix(&mut self, fix: RawFix) -> Option<FilterDecision> {
        if self.state() != SessionState::Running {
            debug!("Ignoring fix for {} in state {:?}", self.id, self.state());
            return None;
        }

        self.stats.fixes_received += 1;
        let now = self.clock.now();
        let decision = evaluate(
            &fix,
            self.last_accepted.as_ref(),
            self.last_delivery,
            &self.config,
            now,
        );

        match decision {
            FilterDecision::Accept => {
                self.sequence += 1;
                self.stats.fixes_delivered += 1;
                self.last_accepted = Some(fix.clone());
                self.last_delivery = Some(now);
                self.rearm_deadline();

                debug!("{} delivering fix #{}", self.id, self.sequence);

                if let Some(consumer) = &self.consumer {
                    consumer.on_fix(DeliveredFix {
                        session_id: self.id,
                        sequence: self.sequence,
                        delivered_at: now,
                        fix,
                    });
                }
            }
            FilterDecision::Reject(reason) => {
                self.stats.record_rejection(reason);
                debug!("{} rejected fix: {}", self.id, reason);
            }
        }

        Some(decision)
    }

    /// The armed deadline elapsed without being pushed back
    pub fn on_timeout(&mut self) {
        if self.state() == SessionState::Running {
            self.stop(StopReason::Timeout);
        }
    }

    /// The sensor failed; report it to the consumer, then stop
    pub fn on_sensor_failure(&mut self, error: SensorError) {
        if self.state() != SessionState::Running {
            return;
        }

        warn!("Sensor failure in {} for {}: {}", self.id, self.owner, error);
        if let Some(consumer) = &self.consumer {
            consumer.on_error(&error);
        }
        self.stop(StopReason::SensorFailure);
    }

    /// Stop the session, releasing the sensor subscription and the timeout
    ///
    /// Returns `true` if this call stopped a running session and sent the
    /// stop notification. Stopping an idle session just retires it; stopping
    /// a stopped session does nothing.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        match self.state() {
            SessionState::Stopped => false,
            SessionState::Idle => {
                debug!("Retiring {} before it started", self.id);
                self.state.send_replace(SessionState::Stopped);
                false
            }
            SessionState::Running => {
                self.deadline = None;
                if let Some(subscription) = self.subscription.take() {
                    self.sensor.cancel(subscription);
                }
                self.state.send_replace(SessionState::Stopped);

                info!(
                    "Stopped {} for {} ({}): {} delivered, {} rejected",
                    self.id,
                    self.owner,
                    reason,
                    self.stats.fixes_delivered,
                    self.stats.fixes_rejected()
                );

                if let Some(consumer) = self.consumer.take() {
                    consumer.on_stopped(self.id, reason);
                }
                self.stop_listener.on_session_stopped(StopNotice {
                    session_id: self.id,
                    owner: self.owner,
                    reason,
                });
                true
            }
        }
    }

    fn rearm_deadline(&mut self) {
        self.deadline = self
            .config
            .has_timeout()
            .then(|| Instant::now().checked_add(self.config.timeout))
            .flatten();
    }
}

impl Drop for ListenerSession {
    fn drop(&mut self) {
        // A session dropped mid-flight (e.g. runtime shutdown) still releases
        // its subscription and reports once
        if self.state() == SessionState::Running {
            self.stop(StopReason::Explicit);
        }
    }
}

impl std::fmt::Debug for ListenerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSession")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("state", &self.state())
            .field("config", &self.config)
            .field("subscription", &self.subscription)
            .field("sequence", &self.sequence)
            .field("stats", &self.stats)
            .finish()
    }
}
