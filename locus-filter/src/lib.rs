//! # locus-filter
//!
//! Pure, side-effect free evaluation of raw position fixes.
//!
//! A location session receives a noisy, high-frequency stream of fixes from a
//! positioning sensor. This crate decides, one fix at a time, whether a fix is
//! worth delivering to an application: it checks the fix age and reported
//! accuracy, then throttles by displacement and by time since the previous
//! delivery unless the session asked for every update.
//!
//! Nothing here owns state. Callers keep the last accepted fix and the last
//! delivery time and hand them back on every call, which keeps [`evaluate`]
//! deterministic and safe to call concurrently for unrelated sessions.
//!
//! ```rust
//! use locus_filter::{evaluate, FilterConfig, FilterDecision, RawFix, Timestamp};
//!
//! let config = FilterConfig::default().with_accuracy_filter(50.0);
//! let now = Timestamp::from_millis(10_000);
//! let fix = RawFix::new(48.8566, 2.3522, 12.0, now);
//!
//! assert_eq!(evaluate(&fix, None, None, &config, now), FilterDecision::Accept);
//! ```

mod config;
mod error;
mod fix;
pub mod geo;
mod policy;

pub use config::{DeliveryMode, FilterConfig};
pub use error::{ConfigError, Result};
pub use fix::{RawFix, Timestamp};
pub use policy::{evaluate, FilterDecision, RejectReason};
