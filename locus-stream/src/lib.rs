//! # locus-stream
//!
//! Listener sessions that turn a raw positioning feed into filtered fix
//! deliveries, and a registry that keeps at most one session per owner.
//!
//! ## Architecture
//!
//! - A [`SensorAdapter`] hands out one [`SensorSubscription`] per session: a
//!   stream of raw fixes or sensor failures.
//! - Each [`ListenerSession`] runs inside its own task. Sensor events, the
//!   timeout deadline and stop commands all funnel through that single task,
//!   so a session never sees two transitions interleave.
//! - The [`SessionRegistry`] maps an [`OwnerId`] to the live session. Starting
//!   a session for an owner that already has one stops the old session first.
//!   Sessions that stop on their own (timeout, sensor failure) report back
//!   through a stop notification and the registry drops their entry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use locus_stream::prelude::*;
//!
//! let sensor = Arc::new(MockSensor::new());
//! let registry = SessionRegistry::new(sensor.clone());
//!
//! let (consumer, mut events) = ChannelConsumer::new();
//! let owner = OwnerId::new(1);
//! registry
//!     .start_session(owner, FilterConfig::significant(), Arc::new(consumer))
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod registry;
pub mod sensor;
pub mod session;
pub mod types;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use consumer::{ChannelConsumer, FixConsumer, SessionEvent, StopListener};
pub use error::{RegistryError, RegistryResult, SensorError, SessionError, SessionResult};
pub use registry::SessionRegistry;
pub use sensor::{
    MockSensor, SensorAdapter, SensorEvent, SensorHints, SensorSubscription, SubscriptionId,
};
pub use session::{ListenerSession, SessionStats};
pub use types::{DeliveredFix, OwnerId, SessionId, SessionState, StopNotice, StopReason};
pub use worker::SessionHandle;

// Re-export the filter types every caller needs
pub use locus_filter::{DeliveryMode, FilterConfig, RawFix, RejectReason, Timestamp};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ChannelConsumer, DeliveryMode, FilterConfig, FixConsumer, MockSensor, OwnerId, RawFix,
        RegistryError, SensorAdapter, SessionEvent, SessionHandle, SessionRegistry, StopReason,
        Timestamp,
    };
}
