//! Sync-first location plugin
//!
//! Provides a fully synchronous API for hosts that route JSON messages from
//! their views. All async work happens on a background worker thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use locus_filter::FilterConfig;
use locus_stream::{Clock, OwnerId, RegistryConfig, SensorAdapter, SessionRegistry, SystemClock};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::bridge::HostBridge;
use crate::error::{PluginError, Result};
use crate::message::{PluginAction, StartRequest};
use crate::worker::{spawn_worker, Command};

/// Configuration for [`LocationPlugin`]
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Registry limits
    pub registry: RegistryConfig,

    /// Name of the worker thread
    /// Default: "locus-location-worker"
    pub thread_name: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            thread_name: "locus-location-worker".to_string(),
        }
    }
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Host-facing location plugin
///
/// Every method blocks only as long as it takes to validate the request and
/// hand it to the worker. Events come back through the [`HostBridge`].
///
/// Methods must not be called from inside an async runtime.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use locus_plugin::{ChannelBridge, LocationPlugin};
/// use locus_stream::{MockSensor, OwnerId};
///
/// let (bridge, events) = ChannelBridge::new();
/// let plugin = LocationPlugin::new(Arc::new(MockSensor::new()), Arc::new(bridge))?;
///
/// plugin.handle_message(
///     OwnerId::new(1),
///     r#"{"action":"startLocation","data":{"mode":"ALL","timeout":30000}}"#,
/// )?;
///
/// for (owner, event) in events {
///     println!("{} <- {}", owner, event.to_json()?);
/// }
/// ```
pub struct LocationPlugin {
    /// Send commands to the background worker
    commands: mpsc::UnboundedSender<Command>,

    /// Worker handle, taken on shutdown
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocationPlugin {
    /// Create a plugin on the system clock with default configuration
    pub fn new(sensor: Arc<dyn SensorAdapter>, bridge: Arc<dyn HostBridge>) -> Result<Self> {
        Self::with_config(sensor, Arc::new(SystemClock), bridge, PluginConfig::default())
    }

    pub fn with_config(
        sensor: Arc<dyn SensorAdapter>,
        clock: Arc<dyn Clock>,
        bridge: Arc<dyn HostBridge>,
        config: PluginConfig,
    ) -> Result<Self> {
        let registry = SessionRegistry::with_config(sensor, clock, config.registry)
            .map_err(|e| PluginError::Runtime(e.to_string()))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let worker = spawn_worker(config.thread_name, registry, bridge, command_rx)?;

        Ok(Self {
            commands,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Dispatch a JSON message from `owner`'s view
    pub fn handle_message(&self, owner: OwnerId, json: &str) -> Result<()> {
        match PluginAction::from_json(json)? {
            PluginAction::StartLocation(request) => self.start_location(owner, request),
            PluginAction::StopLocation => self.stop_location(owner),
        }
    }

    /// Start listening for `owner`
    ///
    /// Invalid parameters are rejected here; nothing reaches the worker.
    pub fn start_location(&self, owner: OwnerId, request: StartRequest) -> Result<()> {
        let config = FilterConfig::try_from(request)?;
        self.start_with_config(owner, config)
    }

    /// Start listening for `owner` with an already built configuration
    pub fn start_with_config(&self, owner: OwnerId, config: FilterConfig) -> Result<()> {
        config.validate()?;
        tracing::debug!("Queueing location start for {}", owner);
        self.send(Command::Start { owner, config })
    }

    /// Stop listening for `owner`; a no-op if it is not listening
    pub fn stop_location(&self, owner: OwnerId) -> Result<()> {
        self.send(Command::Stop { owner })
    }

    /// The host is tearing down `owner`'s view
    pub fn release_owner(&self, owner: OwnerId) -> Result<()> {
        tracing::debug!("Releasing {}", owner);
        self.send(Command::Stop { owner })
    }

    /// Owners with a live session, after every earlier command was processed
    pub fn active_owners(&self) -> Result<Vec<OwnerId>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ActiveOwners { reply })?;
        response
            .blocking_recv()
            .map_err(|_| PluginError::WorkerDisconnected)
    }

    pub fn is_listening(&self, owner: OwnerId) -> Result<bool> {
        Ok(self.active_owners()?.contains(&owner))
    }

    /// Stop every session and wait for the worker thread to exit
    ///
    /// Later calls return [`PluginError::WorkerDisconnected`].
    pub fn shutdown(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };

        // The worker may already be gone; joining is still correct
        let _ = self.commands.send(Command::Shutdown);
        worker
            .join()
            .map_err(|_| PluginError::Runtime("location worker panicked".to_string()))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PluginError::WorkerDisconnected)
    }
}

impl Drop for LocationPlugin {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            tracing::debug!("LocationPlugin dropped, requesting worker shutdown");
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}

impl std::fmt::Debug for LocationPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPlugin")
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}
