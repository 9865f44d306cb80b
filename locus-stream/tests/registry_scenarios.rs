//! End-to-end registry scenarios against the mock sensor

use std::sync::Arc;
use std::time::Duration;

use locus_filter::geo::offset_north;
use locus_stream::prelude::*;
use locus_stream::{Clock, ManualClock, RegistryConfig, SensorError};
use tokio::sync::mpsc;

struct Harness {
    registry: SessionRegistry,
    sensor: Arc<MockSensor>,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        let sensor = Arc::new(MockSensor::new());
        let clock = ManualClock::new(Timestamp::from_millis(1_700_000_000_000));
        let registry = SessionRegistry::with_config(
            sensor.clone(),
            Arc::new(clock.clone()),
            RegistryConfig::default(),
        )
        .expect("valid registry config");
        Self {
            registry,
            sensor,
            clock,
        }
    }

    async fn start(
        &self,
        owner: OwnerId,
        config: FilterConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (consumer, events) = ChannelConsumer::new();
        let handle = self
            .registry
            .start_session(owner, config, Arc::new(consumer))
            .await
            .expect("session should start");
        (handle, events)
    }

    /// Push a fix `north_m` meters north of the origin, stamped now
    fn push_north(&self, north_m: f64) {
        let fix = RawFix::new(offset_north(0.0, north_m), 0.0, 10.0, self.clock.now());
        self.sensor.push_fix(fix);
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_walking_owner_gets_throttled_fixes() {
    let h = Harness::new();
    let owner = OwnerId::new(1);
    let config = FilterConfig::new()
        .with_distance_filter(50.0)
        .with_min_interval(Duration::from_secs(2));
    let (handle, mut events) = h.start(owner, config).await;

    // 60 m every second: distance passes every time, interval every other
    let mut delivered = Vec::new();
    for step in 0..5 {
        h.push_north(60.0 * step as f64);
        tokio::task::yield_now().await;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Fix(fix) = event {
                delivered.push(fix.delivered_at);
            }
        }
        h.clock.advance(Duration::from_secs(1));
    }

    let origin = Timestamp::from_millis(1_700_000_000_000);
    assert_eq!(
        delivered,
        vec![
            origin,
            origin + Duration::from_secs(2),
            origin + Duration::from_secs(4)
        ]
    );

    assert!(h.registry.stop_session(owner).await);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Stopped {
            session_id: handle.id(),
            reason: StopReason::Explicit
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_restart() {
    let h = Harness::new();
    let owner = OwnerId::new(7);
    let config = FilterConfig::continuous().with_timeout(Duration::from_secs(5));

    let (first, mut first_events) = h.start(owner, config.clone()).await;
    tokio::time::sleep(Duration::from_millis(5_001)).await;
    first.stopped().await;

    assert_eq!(
        next_event(&mut first_events).await,
        SessionEvent::Stopped {
            session_id: first.id(),
            reason: StopReason::Timeout
        }
    );
    assert!(!h.registry.is_active(owner));

    let (second, mut second_events) = h.start(owner, config).await;
    assert_eq!(h.registry.session_id(owner), Some(second.id()));

    h.push_north(0.0);
    assert!(matches!(
        next_event(&mut second_events).await,
        SessionEvent::Fix(fix) if fix.session_id == second.id()
    ));
    assert!(first_events.try_recv().is_err());
}

#[tokio::test]
async fn test_superseded_session_releases_sensor() {
    let h = Harness::new();
    let owner = OwnerId::new(3);

    let (first, mut first_events) = h.start(owner, FilterConfig::continuous()).await;
    let (second, _second_events) = h.start(owner, FilterConfig::significant()).await;

    assert_eq!(
        next_event(&mut first_events).await,
        SessionEvent::Stopped {
            session_id: first.id(),
            reason: StopReason::Superseded
        }
    );
    assert_eq!(h.sensor.active_subscriptions(), 1);
    assert_eq!(h.sensor.cancel_count(), 1);
    assert!(second.is_running());

    // The newest subscription carries the newest hints
    let hints = h.sensor.last_hints().expect("hints recorded");
    assert!(hints.significant_only);
}

#[tokio::test]
async fn test_denied_sensor_reports_error_then_stop() {
    let h = Harness::new();
    let owner = OwnerId::new(11);
    let (handle, mut events) = h.start(owner, FilterConfig::continuous()).await;

    h.sensor.push_failure(SensorError::AuthorizationDenied);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Error(SensorError::AuthorizationDenied)
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Stopped {
            session_id: handle.id(),
            reason: StopReason::SensorFailure
        }
    );
    handle.stopped().await;
    assert!(!h.registry.is_active(owner));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_owners() {
    let h = Arc::new(Harness::new());

    let mut tasks = Vec::new();
    for id in 0..16 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            let owner = OwnerId::new(id);
            for _ in 0..3 {
                h.start(owner, FilterConfig::continuous()).await;
            }
        }));
    }
    for task in tasks {
        task.await.expect("task panicked");
    }

    assert_eq!(h.registry.active_count(), 16);
    assert_eq!(h.sensor.active_subscriptions(), 16);
    assert_eq!(h.sensor.request_count(), 48);

    h.registry.shutdown().await;
    assert_eq!(h.registry.active_count(), 0);
    assert_eq!(h.sensor.active_subscriptions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_for_one_owner() {
    let h = Arc::new(Harness::new());
    let owner = OwnerId::new(42);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            h.start(owner, FilterConfig::continuous()).await.0
        }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.expect("task panicked"));
    }

    // Exactly one survivor, and it is the one the registry holds
    let running: Vec<_> = handles.iter().filter(|h| h.is_running()).collect();
    assert_eq!(running.len(), 1);
    assert_eq!(h.registry.session_id(owner), Some(running[0].id()));
    assert_eq!(h.sensor.active_subscriptions(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_limit_under_concurrent_starts() {
    let sensor = Arc::new(MockSensor::new());
    let registry = Arc::new(
        SessionRegistry::with_config(
            sensor.clone(),
            Arc::new(ManualClock::default()),
            RegistryConfig::new().with_max_sessions(4),
        )
        .expect("valid registry config"),
    );

    let mut tasks = Vec::new();
    for id in 0..16 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let (consumer, _events) = ChannelConsumer::new();
            registry
                .start_session(OwnerId::new(id), FilterConfig::continuous(), Arc::new(consumer))
                .await
        }));
    }

    let mut started = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => started += 1,
            Err(RegistryError::RegistryFull { max_sessions }) => assert_eq!(max_sessions, 4),
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(started, 4);
    assert_eq!(registry.active_count(), 4);
    assert_eq!(sensor.active_subscriptions(), 4);
}
