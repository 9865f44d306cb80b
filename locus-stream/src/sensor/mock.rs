//! In-memory sensor for tests and demos

use std::collections::HashMap;

use async_trait::async_trait;
use locus_filter::RawFix;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{SensorAdapter, SensorEvent, SensorHints, SensorSubscription, SubscriptionId};
use crate::error::SensorError;

/// Sensor double that fans pushed fixes out to every live subscription
///
/// It also counts requests and cancellations so tests can check that every
/// stop path released its subscription.
#[derive(Debug, Default)]
pub struct MockSensor {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    feeds: HashMap<SubscriptionId, mpsc::UnboundedSender<SensorEvent>>,
    refusal: Option<SensorError>,
    requests: usize,
    cancellations: usize,
    last_hints: Option<SensorHints>,
}

impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future `request_updates` calls fail with `error`
    pub fn refuse_requests(&self, error: SensorError) {
        self.state.lock().refusal = Some(error);
    }

    /// Accept `request_updates` calls again
    pub fn allow_requests(&self) {
        self.state.lock().refusal = None;
    }

    /// Deliver a fix to every live subscription, returning how many got it
    pub fn push_fix(&self, fix: RawFix) -> usize {
        self.broadcast(SensorEvent::Fix(fix))
    }

    /// Deliver a failure to every live subscription
    pub fn push_failure(&self, error: SensorError) -> usize {
        self.broadcast(SensorEvent::Failure(error))
    }

    /// Close every stream without a failure, as a dying sensor service would
    pub fn end_streams(&self) {
        self.state.lock().feeds.clear();
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().feeds.len()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    pub fn cancel_count(&self) -> usize {
        self.state.lock().cancellations
    }

    pub fn last_hints(&self) -> Option<SensorHints> {
        self.state.lock().last_hints.clone()
    }

    fn broadcast(&self, event: SensorEvent) -> usize {
        let state = self.state.lock();
        state
            .feeds
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}

#[async_trait]
impl SensorAdapter for MockSensor {
    async fn request_updates(&self, hints: SensorHints) -> Result<SensorSubscription, SensorError> {
        let mut state = self.state.lock();
        state.requests += 1;

        if let Some(error) = state.refusal.clone() {
            return Err(error);
        }

        state.next_id += 1;
        let id = SubscriptionId::new(state.next_id);
        let (tx, subscription) = SensorSubscription::channel(id);

        state.feeds.insert(id, tx);
        state.last_hints = Some(hints);

        Ok(subscription)
    }

    fn cancel(&self, subscription: SubscriptionId) {
        let mut state = self.state.lock();
        if state.feeds.remove(&subscription).is_some() {
            state.cancellations += 1;
        }
    }
}
