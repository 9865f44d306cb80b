//! Boundary to the platform positioning sensor
//!
//! The sensor itself lives outside this crate. An adapter hands each session
//! a [`SensorSubscription`], a lazy stream of [`SensorEvent`]s that ends when
//! the subscription is cancelled or the sensor gives up. Subscriptions are not
//! restartable; a new session asks for a new one.

mod mock;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use locus_filter::{DeliveryMode, FilterConfig, RawFix};
use tokio::sync::mpsc;

use crate::error::SensorError;

pub use mock::MockSensor;

/// Identifies one subscription handed out by a sensor adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What the session would like from the sensor
///
/// Hints let the platform save power; the session still filters every fix
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorHints {
    /// Desired accuracy in meters, 0.0 for "best available"
    pub desired_accuracy: f64,
    /// Minimum movement in meters before the sensor needs to report again
    pub distance_filter: f64,
    /// Coarse, significant-change updates are enough
    pub significant_only: bool,
}

impl From<&FilterConfig> for SensorHints {
    fn from(config: &FilterConfig) -> Self {
        Self {
            desired_accuracy: config.accuracy_filter.max(0.0),
            distance_filter: if config.send_all_updates {
                0.0
            } else {
                config.distance_filter.max(0.0)
            },
            significant_only: config.mode == DeliveryMode::Significant && !config.send_all_updates,
        }
    }
}

/// One item from a sensor subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Fix(RawFix),
    /// Terminal; nothing follows a failure
    Failure(SensorError),
}

/// A live subscription: an ID for cancellation plus the event stream
#[derive(Debug)]
pub struct SensorSubscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<SensorEvent>,
}

impl SensorSubscription {
    pub fn new(id: SubscriptionId, events: mpsc::UnboundedReceiver<SensorEvent>) -> Self {
        Self { id, events }
    }

    /// Create a subscription together with the sender that feeds it
    pub fn channel(id: SubscriptionId) -> (mpsc::UnboundedSender<SensorEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(id, rx))
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Stream for SensorSubscription {
    type Item = SensorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Platform positioning service as seen by a listener session
#[async_trait]
pub trait SensorAdapter: Send + Sync {
    /// Start delivering updates for one session
    ///
    /// Authorization problems and missing hardware are reported here when
    /// they are known up front, or later as a [`SensorEvent::Failure`].
    async fn request_updates(&self, hints: SensorHints) -> Result<SensorSubscription, SensorError>;

    /// Stop the subscription and release whatever backs it
    ///
    /// Must return promptly and tolerate IDs that are already gone.
    fn cancel(&self, subscription: SubscriptionId);
}
