use std::fmt::{self, Display};

/// A central error enum for failures raised by a directory backend while
/// opening or closing a proxy connection.
#[derive(Debug)]
pub enum ConnectionError {
    IoError(std::io::Error),
    Timeout { endpoint: String, after_ms: u64 },
    InvalidUrl(String),
    NoEndpoints,
    Other(String),
}

/// Convert from std::io::Error.
impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> ConnectionError {
        ConnectionError::IoError(err)
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::IoError(e) => write!(f, "IO error: {}", e),
            ConnectionError::Timeout { endpoint, after_ms } => {
                write!(f, "Timed out connecting to {} after {} ms", endpoint, after_ms)
            }
            ConnectionError::InvalidUrl(url) => write!(f, "Invalid directory url: {}", url),
            ConnectionError::NoEndpoints => write!(f, "Profile has no directory urls configured"),
            ConnectionError::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
