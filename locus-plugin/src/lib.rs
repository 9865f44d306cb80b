//! # locus-plugin
//!
//! Synchronous facade that lets a host application (a web view bridge, an FFI
//! layer, a test harness) drive location sessions with JSON messages.
//!
//! - The host routes `startLocation` / `stopLocation` messages from a view to
//!   [`LocationPlugin::handle_message`], tagged with the view's [`OwnerId`].
//! - Requests are validated on the caller's thread, then run on a background
//!   worker that owns the [`SessionRegistry`](locus_stream::SessionRegistry).
//! - Fixes, timeouts and sensor errors come back through a [`HostBridge`] as
//!   [`PluginEvent`]s that serialize to `onLocationChanged`,
//!   `onLocationTimeout` and `onLocationError`.
//!
//! Call [`logging::init_logging_from_env`] first if you want the plugin's
//! `tracing` output.

mod bridge;
mod error;
pub mod logging;
mod message;
mod plugin;
mod worker;

pub use bridge::{ChannelBridge, HostBridge};
pub use error::{PluginError, Result};
pub use logging::{LoggingError, LoggingMode};
pub use message::{LocationPayload, PluginAction, PluginEvent, StartRequest};
pub use plugin::{LocationPlugin, PluginConfig};

pub use locus_stream::OwnerId;
