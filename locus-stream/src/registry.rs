//! Owner to session registry with superseding and self-cleanup
//!
//! The registry keeps at most one live session per [`OwnerId`]. It stores the
//! owner's token only, so an owner going away never depends on the registry,
//! and it owns the session handles outright.
//!
//! Entries leave the map in two ways:
//! - `start_session`/`stop_session` remove the entry themselves before stopping
//!   the old session
//! - a session that stops on its own sends a stop notification and the
//!   registry removes the entry *if it still holds that same session*
//!
//! The identity check matters: a superseded session's notification can arrive
//! after its replacement was installed and must not evict it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use locus_filter::FilterConfig;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::consumer::{FixConsumer, StopListener};
use crate::error::{RegistryError, RegistryResult};
use crate::sensor::SensorAdapter;
use crate::session::ListenerSession;
use crate::types::{OwnerId, SessionId, SessionState, StopNotice, StopReason};
use crate::worker::{spawn_session, SessionHandle};

/// Thread-safe registry of the active session of each owner
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// The live session of each owner
    sessions: DashMap<OwnerId, SessionHandle>,

    /// Serializes start/stop for one owner across awaits
    owner_locks: DashMap<OwnerId, Arc<Mutex<()>>>,

    /// Owners with a start in flight. Capacity checks and every insert into
    /// `sessions` happen under this lock.
    pending: parking_lot::Mutex<HashSet<OwnerId>>,

    sensor: Arc<dyn SensorAdapter>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    shut_down: AtomicBool,
}

/// Stop listener given to every session; holds the registry weakly
struct RegistryHook {
    inner: Weak<RegistryInner>,
}

impl StopListener for RegistryHook {
    fn on_session_stopped(&self, notice: StopNotice) {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.remove_stopped(&notice);
            }
            None => debug!("{} stopped after its registry was dropped", notice.session_id),
        }
    }
}

impl SessionRegistry {
    /// Create a registry on the system clock with default configuration
    pub fn new(sensor: Arc<dyn SensorAdapter>) -> Self {
        Self::build(sensor, Arc::new(SystemClock), RegistryConfig::default())
    }

    /// Create a registry with a custom clock and configuration
    pub fn with_config(
        sensor: Arc<dyn SensorAdapter>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> RegistryResult<Self> {
        config.validate()?;
        Ok(Self::build(sensor, clock, config))
    }

    fn build(sensor: Arc<dyn SensorAdapter>, clock: Arc<dyn Clock>, config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                owner_locks: DashMap::new(),
                pending: parking_lot::Mutex::new(HashSet::new()),
                sensor,
                clock,
                config,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Start a new session for `owner`, replacing any session it already has
    ///
    /// The configuration is validated before anything else happens. An
    /// existing session is stopped with [`StopReason::Superseded`] and has
    /// released its sensor subscription before the new one subscribes.
    pub async fn start_session(
        &self,
        owner: OwnerId,
        config: FilterConfig,
        consumer: Arc<dyn FixConsumer>,
    ) -> RegistryResult<SessionHandle> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(RegistryError::ShutDown);
        }
        config.validate()?;

        let lock = self.inner.owner_lock(owner);
        let result = {
            let _guard = lock.lock().await;
            self.inner.start_locked(owner, config, consumer).await
        };
        drop(lock);
        self.inner.release_owner_lock(owner);

        result
    }

    /// Stop the session of `owner`
    ///
    /// Returns `false` if the owner had no session; that is not an error.
    pub async fn stop_session(&self, owner: OwnerId) -> bool {
        let lock = self.inner.owner_lock(owner);
        let stopped = {
            let _guard = lock.lock().await;
            match self.inner.sessions.remove(&owner) {
                Some((_, handle)) => {
                    info!("Stopping {} for {}", handle.id(), owner);
                    handle.stop(StopReason::Explicit).await;
                    true
                }
                None => {
                    debug!("No session to stop for {}", owner);
                    false
                }
            }
        };
        drop(lock);
        self.inner.release_owner_lock(owner);

        stopped
    }

    /// Handle a session's stop notification
    ///
    /// Removes the owner's entry only if it still refers to the notified
    /// session. Returns whether an entry was removed.
    pub fn on_session_stopped(&self, notice: &StopNotice) -> bool {
        self.inner.remove_stopped(notice)
    }

    /// Whether `owner` currently has a session
    pub fn is_active(&self, owner: OwnerId) -> bool {
        self.inner.sessions.contains_key(&owner)
    }

    /// The ID of `owner`'s current session
    pub fn session_id(&self, owner: OwnerId) -> Option<SessionId> {
        self.inner.sessions.get(&owner).map(|handle| handle.id())
    }

    /// A handle to `owner`'s current session
    pub fn session(&self, owner: OwnerId) -> Option<SessionHandle> {
        self.inner.sessions.get(&owner).map(|handle| handle.clone())
    }

    /// Number of owners with a session
    pub fn active_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Owners that currently have a session
    pub fn owners(&self) -> Vec<OwnerId> {
        self.inner.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Stop every session and refuse new ones
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        // Starts committing after this point see the flag; earlier ones are
        // already in the map
        drop(self.inner.pending.lock());

        let owners = self.owners();
        info!("Shutting down session registry, {} active sessions", owners.len());

        for owner in owners {
            self.stop_session(owner).await;
        }
    }
}

impl RegistryInner {
    async fn start_locked(
        self: &Arc<Self>,
        owner: OwnerId,
        config: FilterConfig,
        consumer: Arc<dyn FixConsumer>,
    ) -> RegistryResult<SessionHandle> {
        let reservation = self.reserve(owner)?;

        if let Some((_, previous)) = self.sessions.remove(&owner) {
            info!("Superseding {} for {}", previous.id(), owner);
            previous.stop(StopReason::Superseded).await;
        }

        let session = ListenerSession::new(
            owner,
            Arc::clone(&self.sensor),
            Arc::clone(&self.clock),
            Arc::new(RegistryHook {
                inner: Arc::downgrade(self),
            }),
        );
        let handle = spawn_session(session, config, consumer).await?;

        if !reservation.commit(&handle) {
            info!("Registry shut down while {} was starting", handle.id());
            handle.stop(StopReason::Explicit).await;
            return Err(RegistryError::ShutDown);
        }

        // The session may have stopped before it was inserted; its
        // notification found nothing to remove then, so drop it here
        if handle.state() == SessionState::Stopped {
            self.sessions.remove_if(&owner, |_, entry| entry.id() == handle.id());
        }

        debug!("Registered {} for {}", handle.id(), owner);
        Ok(handle)
    }

    /// Claim a slot for `owner` until its start commits or fails
    ///
    /// An owner that already has a session keeps its slot. Otherwise live
    /// sessions plus starts in flight for other new owners must stay below
    /// the limit.
    fn reserve(&self, owner: OwnerId) -> RegistryResult<Reservation<'_>> {
        let mut pending = self.pending.lock();

        if !self.sessions.contains_key(&owner) {
            let in_flight = pending
                .iter()
                .filter(|other| !self.sessions.contains_key(*other))
                .count();
            if self.sessions.len() + in_flight >= self.config.max_sessions {
                return Err(RegistryError::RegistryFull {
                    max_sessions: self.config.max_sessions,
                });
            }
        }

        pending.insert(owner);
        Ok(Reservation { inner: self, owner })
    }

    fn remove_stopped(&self, notice: &StopNotice) -> bool {
        let removed = self
            .sessions
            .remove_if(&notice.owner, |_, handle| handle.id() == notice.session_id)
            .is_some();

        if removed {
            debug!(
                "Removed {} for {} ({})",
                notice.session_id, notice.owner, notice.reason
            );
            self.release_owner_lock(notice.owner);
        } else {
            debug!(
                "Stop notice for {} ignored, {} has no such entry",
                notice.session_id, notice.owner
            );
        }

        removed
    }

    fn owner_lock(&self, owner: OwnerId) -> Arc<Mutex<()>> {
        self.owner_locks.entry(owner).or_default().clone()
    }

    /// Forget the owner's lock once nobody holds it
    fn release_owner_lock(&self, owner: OwnerId) {
        self.owner_locks
            .remove_if(&owner, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A start in flight; released on drop if it never commits
struct Reservation<'a> {
    inner: &'a RegistryInner,
    owner: OwnerId,
}

impl Reservation<'_> {
    /// Insert the started session, unless the registry shut down meanwhile
    fn commit(self, handle: &SessionHandle) -> bool {
        let mut pending = self.inner.pending.lock();
        pending.remove(&self.owner);

        let open = !self.inner.shut_down.load(Ordering::SeqCst);
        if open {
            self.inner.sessions.insert(self.owner, handle.clone());
        }

        // Released before `self` drops and locks again
        drop(pending);
        open
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.inner.pending.lock().remove(&self.owner);
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        debug!(
            "SessionRegistry dropping, {} active sessions",
            self.inner.sessions.len()
        );

        for entry in self.inner.sessions.iter() {
            entry.value().request_stop(StopReason::Explicit);
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("active_sessions", &self.inner.sessions.len())
            .field("config", &self.inner.config)
            .finish()
    }
}
