//! Background worker thread for the plugin
//!
//! Owns a current-thread tokio runtime and the [`SessionRegistry`]. The sync
//! [`LocationPlugin`](crate::LocationPlugin) talks to it through a command
//! channel; session tasks run on the same runtime.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use locus_filter::FilterConfig;
use locus_stream::{OwnerId, RegistryError, SessionError, SessionRegistry};
use tokio::sync::{mpsc, oneshot};

use crate::bridge::{HostBridge, HostConsumer};
use crate::error::{PluginError, Result};
use crate::message::PluginEvent;

/// Commands sent from the sync facade to the worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Start (or replace) the owner's session
    Start { owner: OwnerId, config: FilterConfig },
    /// Stop the owner's session, if any
    Stop { owner: OwnerId },
    /// Report the owners with a live session
    ActiveOwners { reply: oneshot::Sender<Vec<OwnerId>> },
    /// Stop every session and exit
    Shutdown,
}

/// Spawn the worker thread
///
/// The runtime is built on the calling thread so a failure is reported to
/// the caller instead of only being logged.
pub(crate) fn spawn_worker(
    thread_name: String,
    registry: SessionRegistry,
    bridge: Arc<dyn HostBridge>,
    commands: mpsc::UnboundedReceiver<Command>,
) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PluginError::Runtime(format!("failed to build worker runtime: {e}")))?;

    thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            runtime.block_on(run_worker(registry, bridge, commands));
        })
        .map_err(|e| PluginError::Runtime(format!("failed to spawn worker thread: {e}")))
}

async fn run_worker(
    registry: SessionRegistry,
    bridge: Arc<dyn HostBridge>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    tracing::info!("Location worker started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Start { owner, config } => {
                let consumer = Arc::new(HostConsumer::new(owner, Arc::clone(&bridge)));
                match registry.start_session(owner, config, consumer).await {
                    Ok(handle) => {
                        tracing::debug!("Worker: {} listening for {}", handle.id(), owner);
                    }
                    Err(RegistryError::Session(SessionError::Sensor(error))) => {
                        tracing::warn!("Sensor refused updates for {}: {}", owner, error);
                        bridge.send(owner, PluginEvent::error(&error));
                    }
                    Err(error) => {
                        tracing::warn!("Failed to start location for {}: {}", owner, error);
                        bridge.send(
                            owner,
                            PluginEvent::LocationError {
                                code: "unavailable".to_string(),
                                message: error.to_string(),
                            },
                        );
                    }
                }
            }
            Command::Stop { owner } => {
                tracing::debug!("Worker: stopping location for {}", owner);
                registry.stop_session(owner).await;
            }
            Command::ActiveOwners { reply } => {
                let _ = reply.send(registry.owners());
            }
            Command::Shutdown => {
                tracing::info!("Worker received shutdown command");
                break;
            }
        }
    }

    registry.shutdown().await;
    tracing::info!("Location worker shut down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_debug() {
        let cmd = Command::Stop {
            owner: OwnerId::new(3),
        };
        assert!(format!("{:?}", cmd).contains("Stop"));
    }
}
