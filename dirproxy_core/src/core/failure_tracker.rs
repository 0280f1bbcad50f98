use crate::core::error_record::{ErrorKind, ErrorRecord};
use crate::storage::attributes::{AttributeStore, StoreError};
use crate::storage::profile::ProfileId;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Attribute key holding the persisted failure snapshot.
pub const LAST_ERROR_ATTRIBUTE: &str = "LAST_DIRECTORY_ERROR";

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk shape of the failure map.
///
/// `{"version":1,"failures":{"corp":{"code":"connection_open_failure","message":"...","occurred_at":"..."}}}`
#[derive(Debug, Serialize, Deserialize)]
struct FailureSnapshot {
    version: u32,
    failures: BTreeMap<ProfileId, ErrorRecord>,
}

/// Last failure per profile, written through to an [`AttributeStore`].
pub struct FailureTracker {
    store: Arc<dyn AttributeStore>,
    failures: Mutex<HashMap<ProfileId, ErrorRecord>>,
}

impl FailureTracker {
    /// Builds a tracker seeded with whatever `store` still remembers.
    pub fn load(store: Arc<dyn AttributeStore>) -> Self {
        let failures = Self::read_snapshot(store.as_ref());
        Self {
            store,
            failures: Mutex::new(failures),
        }
    }

    /// Reads the persisted failure map. Missing, empty and malformed
    /// snapshots all come back as an empty map.
    pub fn read_snapshot(store: &dyn AttributeStore) -> HashMap<ProfileId, ErrorRecord> {
        let raw = match store.read_attribute(LAST_ERROR_ATTRIBUTE) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => return HashMap::new(),
            Err(e) => {
                error!(
                    "{} loading cached directory failure statuses: {}",
                    ErrorKind::PersistenceReadFailure,
                    e
                );
                return HashMap::new();
            }
        };

        match serde_json::from_str::<FailureSnapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => {
                debug!(
                    "Loaded {} cached directory failure record(s)",
                    snapshot.failures.len()
                );
                snapshot.failures.into_iter().collect()
            }
            Ok(snapshot) => {
                warn!(
                    "Ignoring cached directory failure statuses with unsupported version {}",
                    snapshot.version
                );
                HashMap::new()
            }
            Err(e) => {
                error!(
                    "{} loading cached directory failure statuses: {}",
                    ErrorKind::PersistenceReadFailure,
                    e
                );
                HashMap::new()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProfileId, ErrorRecord>> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the entry for `profile_id` and persists the whole map.
    ///
    /// The store write is synchronous and happens while the tracker lock is
    /// held, so readers wait for it. A persistence failure is logged; the
    /// in-memory update stays.
    pub fn record(&self, profile_id: &ProfileId, record: ErrorRecord) {
        let mut failures = self.lock();
        failures.insert(profile_id.clone(), record);

        // the write happens under the lock so snapshots land in update order
        let snapshot = FailureSnapshot {
            version: SNAPSHOT_VERSION,
            failures: failures
                .iter()
                .map(|(id, r)| (id.clone(), r.clone()))
                .collect(),
        };
        let written = serde_json::to_string(&snapshot)
            .map_err(StoreError::from)
            .and_then(|json| self.store.write_attribute(LAST_ERROR_ATTRIBUTE, Some(&json)));
        if let Err(e) = written {
            error!(
                "{} saving directory failure for '{}': {}",
                ErrorKind::PersistenceWriteFailure,
                profile_id,
                e
            );
        }
    }

    pub fn get(&self, profile_id: &ProfileId) -> Option<ErrorRecord> {
        self.lock().get(profile_id).cloned()
    }

    /// Owned copy of the whole map.
    pub fn all(&self) -> HashMap<ProfileId, ErrorRecord> {
        self.lock().clone()
    }

    pub fn timestamp(&self, profile_id: &ProfileId) -> Option<DateTime<Utc>> {
        self.lock().get(profile_id).map(ErrorRecord::occurred_at)
    }
}
