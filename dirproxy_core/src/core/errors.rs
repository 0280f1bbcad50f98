use std::fmt::{self, Display};

use super::error_record::{ErrorKind, ErrorRecord};
use super::service::ServiceStatus;
use crate::storage::profile::ProfileId;

/// Errors surfaced to callers of the directory connection service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    UnknownProfile(ProfileId),
    ConnectionOpenFailure(ErrorRecord),
    IllegalState {
        operation: &'static str,
        status: ServiceStatus,
    },
    Configuration(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::UnknownProfile(_) => ErrorKind::UnknownProfile,
            ServiceError::ConnectionOpenFailure(_) => ErrorKind::ConnectionOpenFailure,
            ServiceError::IllegalState { .. } | ServiceError::Configuration(_) => {
                ErrorKind::IllegalState
            }
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::UnknownProfile(id) => {
                write!(f, "unknown directory profile requested connection: {}", id)
            }
            ServiceError::ConnectionOpenFailure(record) => {
                write!(f, "unable to open directory connection: {}", record.message())
            }
            ServiceError::IllegalState { operation, status } => {
                write!(f, "cannot {} while service is {}", operation, status)
            }
            ServiceError::Configuration(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Outcome of a failed registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry has been shut down.
    Closed,
    /// The backend open failed; every waiter sees the same record.
    Open(ErrorRecord),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Closed => write!(f, "connection registry is closed"),
            RegistryError::Open(record) => write!(f, "open failed: {}", record.message()),
        }
    }
}

impl std::error::Error for RegistryError {}
