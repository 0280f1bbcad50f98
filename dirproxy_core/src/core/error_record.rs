use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::connections::errors::ConnectionError;

/// Classification of a failure seen by the connection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownProfile,
    ConnectionOpenFailure,
    IllegalState,
    PersistenceReadFailure,
    PersistenceWriteFailure,
}

impl ErrorKind {
    /// Whether a caller may expect a later attempt to succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ConnectionOpenFailure)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnknownProfile => "unknown profile",
            ErrorKind::ConnectionOpenFailure => "connection open failure",
            ErrorKind::IllegalState => "illegal state",
            ErrorKind::PersistenceReadFailure => "persistence read failure",
            ErrorKind::PersistenceWriteFailure => "persistence write failure",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    code: ErrorKind,
    message: String,
    occurred_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(code: ErrorKind, message: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            code,
            message: message.into(),
            occurred_at,
        }
    }

    /// Stamped with the current time.
    pub fn now(code: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(code, message, Utc::now())
    }

    pub fn from_connection_error(err: &ConnectionError) -> Self {
        Self::now(ErrorKind::ConnectionOpenFailure, err.to_string())
    }

    pub fn code(&self) -> ErrorKind {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}: {}",
            self.code,
            self.occurred_at.to_rfc3339(),
            self.message
        )
    }
}
