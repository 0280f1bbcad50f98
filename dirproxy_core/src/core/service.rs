use crate::connections::connection::DirectoryBackend;
use crate::core::connection_registry::{ConnectionHandle, ConnectionRegistry};
use crate::core::error_record::ErrorRecord;
use crate::core::errors::{RegistryError, ServiceError};
use crate::core::failure_tracker::FailureTracker;
use crate::core::health::{directory_health, HealthRecord};
use crate::storage::attributes::AttributeStore;
use crate::storage::catalog::ProfileSource;
use crate::storage::profile::{DirectoryProfile, ProfileId};
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Lifecycle of the service. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceStatus {
    New = 0,
    Open = 1,
    Closed = 2,
}

impl ServiceStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceStatus::New,
            1 => ServiceStatus::Open,
            _ => ServiceStatus::Closed,
        }
    }
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::New => f.write_str("NEW"),
            ServiceStatus::Open => f.write_str("OPEN"),
            ServiceStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Data storage methods a service provides to the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub storage_methods: Vec<&'static str>,
}

struct ServiceParts {
    profiles: Arc<dyn ProfileSource>,
    tracker: FailureTracker,
}

/// Owns the proxy connections to every configured directory profile and
/// remembers the last failure seen for each of them.
///
/// Construct with [`DirectoryConnectionService::new`], call
/// [`init`](Self::init) exactly once, and [`close`](Self::close) on shutdown.
/// A closed service cannot be reopened.
pub struct DirectoryConnectionService {
    backend: Arc<dyn DirectoryBackend>,
    status: AtomicU8,
    parts: OnceLock<ServiceParts>,
    registry: ConnectionRegistry,
}

impl DirectoryConnectionService {
    pub fn new(backend: Arc<dyn DirectoryBackend>) -> Self {
        Self {
            backend,
            status: AtomicU8::new(ServiceStatus::New as u8),
            parts: OnceLock::new(),
            registry: ConnectionRegistry::new(),
        }
    }

    /// Loads persisted failures and opens the service.
    ///
    /// An unreadable failure snapshot is logged and treated as "no known
    /// failures". Calling this twice is a configuration error.
    pub fn init(
        &self,
        profiles: Arc<dyn ProfileSource>,
        store: Arc<dyn AttributeStore>,
    ) -> Result<(), ServiceError> {
        if self.status() != ServiceStatus::New {
            return Err(ServiceError::Configuration(format!(
                "directory connection service already initialized (status {})",
                self.status()
            )));
        }

        let tracker = FailureTracker::load(store);
        let known_failures = tracker.all().len();
        self.parts
            .set(ServiceParts { profiles, tracker })
            .map_err(|_| {
                ServiceError::Configuration(
                    "directory connection service already initialized".to_string(),
                )
            })?;

        self.status
            .compare_exchange(
                ServiceStatus::New as u8,
                ServiceStatus::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|current| ServiceError::IllegalState {
                operation: "init",
                status: ServiceStatus::from_u8(current),
            })?;

        info!(
            "Directory connection service open ({} cached failure record(s))",
            known_failures
        );
        Ok(())
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn illegal_state(&self, operation: &'static str) -> ServiceError {
        ServiceError::IllegalState {
            operation,
            status: self.status(),
        }
    }

    fn open_parts(&self, operation: &'static str) -> Result<&ServiceParts, ServiceError> {
        match (self.status(), self.parts.get()) {
            (ServiceStatus::Open, Some(parts)) => Ok(parts),
            _ => Err(self.illegal_state(operation)),
        }
    }

    /// Read accessors keep working after `close`.
    fn readable_parts(&self, operation: &'static str) -> Result<&ServiceParts, ServiceError> {
        match (self.status(), self.parts.get()) {
            (ServiceStatus::Open | ServiceStatus::Closed, Some(parts)) => Ok(parts),
            _ => Err(self.illegal_state(operation)),
        }
    }

    /// Marks the service closed, then closes every cached proxy connection.
    ///
    /// Never fails; individual close errors are logged.
    pub async fn close(&self) {
        let previous =
            ServiceStatus::from_u8(self.status.swap(ServiceStatus::Closed as u8, Ordering::AcqRel));
        if previous == ServiceStatus::Closed {
            debug!("Directory connection service already closed");
            return;
        }

        trace!("closing directory proxy connections");
        let failures = self.registry.close_all().await;
        if failures.is_empty() {
            info!("Directory connection service closed");
        } else {
            warn!(
                "Directory connection service closed; {} proxy connection(s) did not close cleanly",
                failures.len()
            );
        }
    }

    /// Returns the proxy connection for `profile_id` (`None` is the default
    /// profile), opening it on first use.
    ///
    /// An open failure is recorded against the profile before it is returned.
    pub async fn get_connection(
        &self,
        profile_id: Option<&str>,
    ) -> Result<ConnectionHandle, ServiceError> {
        const OPERATION: &str = "get a directory connection";
        let parts = self.open_parts(OPERATION)?;
        let id = ProfileId::resolve(profile_id);
        let profile = parts
            .profiles
            .resolve_profile(&id)
            .ok_or_else(|| ServiceError::UnknownProfile(id.clone()))?;

        let backend = &self.backend;
        let tracker = &parts.tracker;
        self.registry
            .get_or_create(&id, || async move {
                backend.open(&profile).await.map_err(|e| {
                    warn!(
                        "Unable to open proxy connection for profile {}: {}",
                        profile.id, e
                    );
                    let record = ErrorRecord::from_connection_error(&e);
                    tracker.record(&profile.id, record.clone());
                    record
                })
            })
            .await
            .map_err(|e| match e {
                RegistryError::Closed => self.illegal_state(OPERATION),
                RegistryError::Open(record) => ServiceError::ConnectionOpenFailure(record),
            })
    }

    pub async fn connection_for(
        &self,
        profile: &DirectoryProfile,
    ) -> Result<ConnectionHandle, ServiceError> {
        self.get_connection(Some(profile.id.as_str())).await
    }

    /// Closes and forgets the cached connection for `profile_id` so the next
    /// `get_connection` opens a fresh one. Returns whether one was cached.
    pub async fn invalidate_connection(
        &self,
        profile_id: Option<&str>,
    ) -> Result<bool, ServiceError> {
        self.open_parts("invalidate a directory connection")?;
        Ok(self.registry.remove(&ProfileId::resolve(profile_id)).await)
    }

    /// Profiles that currently have a cached connection.
    pub fn connected_profiles(&self) -> Result<Vec<ProfileId>, ServiceError> {
        self.readable_parts("list connected profiles")?;
        Ok(self.registry.live_profiles())
    }

    pub fn record_failure(
        &self,
        profile_id: Option<&str>,
        record: ErrorRecord,
    ) -> Result<(), ServiceError> {
        let parts = self.open_parts("record a directory failure")?;
        parts.tracker.record(&ProfileId::resolve(profile_id), record);
        Ok(())
    }

    pub fn last_failure(&self, profile_id: Option<&str>) -> Result<Option<ErrorRecord>, ServiceError> {
        let parts = self.readable_parts("read directory failures")?;
        Ok(parts.tracker.get(&ProfileId::resolve(profile_id)))
    }

    pub fn all_last_failures(&self) -> Result<HashMap<ProfileId, ErrorRecord>, ServiceError> {
        let parts = self.readable_parts("read directory failures")?;
        Ok(parts.tracker.all())
    }

    pub fn last_failure_time(
        &self,
        profile_id: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let parts = self.readable_parts("read directory failures")?;
        Ok(parts.tracker.timestamp(&ProfileId::resolve(profile_id)))
    }

    /// Health derived from recorded failures; never contacts a backend.
    pub fn health_snapshot(&self) -> Result<Vec<HealthRecord>, ServiceError> {
        let parts = self.readable_parts("report directory health")?;
        Ok(directory_health(
            &parts.tracker.all(),
            &self.registry.live_handles(),
        ))
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            storage_methods: vec!["LDAP"],
        }
    }
}
