use crate::connections::{connection::DirectoryConnection, errors::ConnectionError};
use crate::core::error_record::ErrorRecord;
use crate::core::errors::RegistryError;
use crate::storage::profile::ProfileId;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

type OpenOutcome = Option<Result<ConnectionHandle, RegistryError>>;

struct HandleInner {
    profile_id: ProfileId,
    endpoint: String,
    opened_at: DateTime<Utc>,
    closed: AtomicBool,
    connection: tokio::sync::Mutex<Option<Box<dyn DirectoryConnection>>>,
}

/// A live proxy connection owned by the [`ConnectionRegistry`].
///
/// Cloning is cheap and every clone refers to the same backend connection.
/// Holders never own its lifetime: the registry closes it on shutdown or
/// eviction, after which `is_closed` reports `true`.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    fn new(profile_id: ProfileId, connection: Box<dyn DirectoryConnection>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                profile_id,
                endpoint: connection.endpoint().to_string(),
                opened_at: Utc::now(),
                closed: AtomicBool::new(false),
                connection: tokio::sync::Mutex::new(Some(connection)),
            }),
        }
    }

    pub fn profile_id(&self) -> &ProfileId {
        &self.inner.profile_id
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.inner.opened_at
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// `true` when both handles share one backend connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Idempotent; only the first call reaches the backend.
    async fn close(&self) -> Result<(), ConnectionError> {
        let mut slot = self.inner.connection.lock().await;
        self.inner.closed.store(true, Ordering::Release);
        match slot.take() {
            Some(mut connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("profile_id", &self.inner.profile_id)
            .field("endpoint", &self.inner.endpoint)
            .field("opened_at", &self.inner.opened_at)
            .field("closed", &self.is_closed())
            .finish()
    }
}

enum Slot {
    Ready(ConnectionHandle),
    /// Claimed by one caller whose open is in flight; others wait on `rx`.
    Opening {
        claim: u64,
        rx: watch::Receiver<OpenOutcome>,
    },
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<ProfileId, Slot>,
    closed: bool,
    next_claim: u64,
}

enum Lookup {
    Found(ConnectionHandle),
    Wait(watch::Receiver<OpenOutcome>),
    Claimed(u64, watch::Sender<OpenOutcome>),
}

enum Publish {
    Published(ConnectionHandle),
    Rejected(ConnectionHandle),
}

/// Releases a claimed slot if the claimant's future is dropped before it
/// publishes, so the profile does not stay stuck in `Opening`.
struct ClaimGuard<'a> {
    registry: &'a ConnectionRegistry,
    profile_id: &'a ProfileId,
    claim: u64,
    armed: bool,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                "Open for profile '{}' abandoned before completion; releasing slot",
                self.profile_id
            );
            self.registry.release(self.profile_id, self.claim);
        }
    }
}

/// Holds at most one live connection per profile.
///
/// The map sits behind a std mutex that is never held across an `.await`.
/// A missing profile is claimed by the first caller, which opens the
/// connection outside the lock and then publishes the result to everybody
/// who queued up behind it in the meantime.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached handle for `profile_id` or opens one with `open`.
    ///
    /// `open` runs at most once per claim: concurrent callers for the same
    /// profile wait for the claimant and receive its handle or its error.
    /// A failed open leaves no entry behind.
    pub async fn get_or_create<F, Fut>(
        &self,
        profile_id: &ProfileId,
        open: F,
    ) -> Result<ConnectionHandle, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Box<dyn DirectoryConnection>, ErrorRecord>>,
    {
        let (claim, tx) = loop {
            match self.lookup(profile_id)? {
                Lookup::Found(handle) => return Ok(handle),
                Lookup::Wait(mut rx) => {
                    debug!("Waiting for in-flight open of profile '{}'", profile_id);
                    // Err means the claimant was dropped and its guard released the slot
                    if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                        if let Some(result) = outcome.clone() {
                            return result;
                        }
                    }
                }
                Lookup::Claimed(claim, tx) => break (claim, tx),
            }
        };

        let mut guard = ClaimGuard {
            registry: self,
            profile_id,
            claim,
            armed: true,
        };
        let result = match open().await {
            Ok(connection) => {
                let handle = ConnectionHandle::new(profile_id.clone(), connection);
                match self.publish(profile_id, claim, handle) {
                    Publish::Published(handle) => Ok(handle),
                    Publish::Rejected(handle) => {
                        info!(
                            "Registry closed while opening profile '{}'; closing new connection",
                            profile_id
                        );
                        if let Err(e) = handle.close().await {
                            error!(
                                "Error closing proxy connection for '{}': {}",
                                profile_id, e
                            );
                        }
                        Err(RegistryError::Closed)
                    }
                }
            }
            Err(record) => {
                self.release(profile_id, claim);
                Err(RegistryError::Open(record))
            }
        };
        guard.armed = false;
        tx.send_replace(Some(result.clone()));
        result
    }

    fn lookup(&self, profile_id: &ProfileId) -> Result<Lookup, RegistryError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(RegistryError::Closed);
        }
        match state.slots.get(profile_id) {
            Some(Slot::Ready(handle)) => Ok(Lookup::Found(handle.clone())),
            Some(Slot::Opening { rx, .. }) => Ok(Lookup::Wait(rx.clone())),
            None => {
                let claim = state.next_claim;
                state.next_claim += 1;
                let (tx, rx) = watch::channel(None);
                state
                    .slots
                    .insert(profile_id.clone(), Slot::Opening { claim, rx });
                debug!("Claimed slot {} for profile '{}'", claim, profile_id);
                Ok(Lookup::Claimed(claim, tx))
            }
        }
    }

    fn publish(&self, profile_id: &ProfileId, claim: u64, handle: ConnectionHandle) -> Publish {
        let mut state = self.lock();
        if state.closed {
            Self::release_locked(&mut state, profile_id, claim);
            return Publish::Rejected(handle);
        }
        state
            .slots
            .insert(profile_id.clone(), Slot::Ready(handle.clone()));
        Publish::Published(handle)
    }

    fn release(&self, profile_id: &ProfileId, claim: u64) {
        let mut state = self.lock();
        Self::release_locked(&mut state, profile_id, claim);
    }

    fn release_locked(state: &mut RegistryState, profile_id: &ProfileId, claim: u64) {
        if matches!(
            state.slots.get(profile_id),
            Some(Slot::Opening { claim: c, .. }) if *c == claim
        ) {
            state.slots.remove(profile_id);
        }
    }

    /// Cached handle for `profile_id`, without opening anything.
    pub fn get(&self, profile_id: &ProfileId) -> Option<ConnectionHandle> {
        match self.lock().slots.get(profile_id) {
            Some(Slot::Ready(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Every currently cached handle.
    pub fn live_handles(&self) -> Vec<ConnectionHandle> {
        self.lock()
            .slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(handle) => Some(handle.clone()),
                Slot::Opening { .. } => None,
            })
            .collect()
    }

    pub fn live_profiles(&self) -> Vec<ProfileId> {
        let mut ids: Vec<ProfileId> = self
            .live_handles()
            .into_iter()
            .map(|h| h.profile_id().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Evicts and closes the cached handle for `profile_id`.
    ///
    /// Returns `false` when nothing was cached. An open still in flight is
    /// left alone.
    pub async fn remove(&self, profile_id: &ProfileId) -> bool {
        let removed = {
            let mut state = self.lock();
            if matches!(state.slots.get(profile_id), Some(Slot::Ready(_))) {
                state.slots.remove(profile_id)
            } else {
                None
            }
        };
        match removed {
            Some(Slot::Ready(handle)) => {
                info!("Evicting proxy connection for profile '{}'", profile_id);
                if let Err(e) = handle.close().await {
                    error!("Error closing proxy connection for '{}': {}", profile_id, e);
                }
                true
            }
            _ => false,
        }
    }

    /// Shuts the registry down and closes every cached handle.
    ///
    /// After this call no handle can be published any more. Close failures
    /// are logged one by one and handed back to the caller; they never stop
    /// the remaining handles from being closed.
    pub async fn close_all(&self) -> Vec<(ProfileId, ConnectionError)> {
        let handles: Vec<ConnectionHandle> = {
            let mut state = self.lock();
            state.closed = true;
            state
                .slots
                .drain()
                .filter_map(|(_, slot)| match slot {
                    Slot::Ready(handle) => Some(handle),
                    Slot::Opening { .. } => None,
                })
                .collect()
        };

        let mut failures = Vec::new();
        for handle in handles {
            debug!("Closing proxy connection for '{}'", handle.profile_id());
            if let Err(e) = handle.close().await {
                error!(
                    "Error closing proxy connection for '{}': {}",
                    handle.profile_id(),
                    e
                );
                failures.push((handle.profile_id().clone(), e));
            }
        }
        failures
    }
}
