use crate::connections::{
    connection::{DirectoryBackend, DirectoryConnection},
    errors::ConnectionError,
};
use crate::storage::profile::DirectoryProfile;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const LDAP_PORT: u16 = 389;
const LDAPS_PORT: u16 = 636;

/// Reachability-only backend: opens a TCP session to the first profile url
/// that answers within the profile's connect timeout, trying urls in order.
///
/// No bind or search is performed; the session simply proves the directory
/// is reachable and stays open until the registry closes it.
#[derive(Debug, Clone, Default)]
pub struct TcpBackend;

impl TcpBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryBackend for TcpBackend {
    async fn open(
        &self,
        profile: &DirectoryProfile,
    ) -> Result<Box<dyn DirectoryConnection>, ConnectionError> {
        let timeout = Duration::from_millis(profile.connect_timeout_ms);
        let mut last_error = ConnectionError::NoEndpoints;

        for url in &profile.urls {
            let endpoint = match endpoint_from_url(url) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!("Skipping url '{}' of profile '{}': {}", url, profile.id, e);
                    last_error = e;
                    continue;
                }
            };

            debug!("Connecting to {} for profile '{}'", endpoint, profile.id);
            match tokio::time::timeout(timeout, TcpStream::connect(&endpoint)).await {
                Ok(Ok(stream)) => {
                    info!(
                        "Proxy connection for profile '{}' established to {}",
                        profile.id, endpoint
                    );
                    return Ok(Box::new(TcpConnection {
                        endpoint,
                        stream: Some(stream),
                    }));
                }
                Ok(Err(e)) => {
                    warn!("Connect to {} failed: {}", endpoint, e);
                    last_error = ConnectionError::IoError(e);
                }
                Err(_) => {
                    warn!("Connect to {} timed out", endpoint);
                    last_error = ConnectionError::Timeout {
                        endpoint,
                        after_ms: profile.connect_timeout_ms,
                    };
                }
            }
        }
        Err(last_error)
    }
}

pub struct TcpConnection {
    endpoint: String,
    stream: Option<TcpStream>,
}

#[async_trait]
impl DirectoryConnection for TcpConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Shutting down session to {}", self.endpoint);
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Turns `ldap://host[:port]`, `ldaps://host[:port]` or `host:port` into a
/// connectable `host:port` string.
pub fn endpoint_from_url(url: &str) -> Result<String, ConnectionError> {
    let trimmed = url.trim();
    let (rest, default_port) = if let Some(rest) = trimmed.strip_prefix("ldaps://") {
        (rest, Some(LDAPS_PORT))
    } else if let Some(rest) = trimmed.strip_prefix("ldap://") {
        (rest, Some(LDAP_PORT))
    } else if trimmed.contains("://") {
        return Err(ConnectionError::InvalidUrl(url.to_string()));
    } else {
        (trimmed, None)
    };

    // drop any trailing "/dn?attrs" part
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ConnectionError::InvalidUrl(url.to_string()));
    }

    // IPv6 literals must be bracketed
    if !authority.starts_with('[') && authority.matches(':').count() > 1 {
        return Err(ConnectionError::InvalidUrl(url.to_string()));
    }

    // a bracketed IPv6 literal without a port ends in ']'
    let has_port = match authority.rsplit_once(':').filter(|_| !authority.ends_with(']')) {
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(ConnectionError::InvalidUrl(url.to_string()));
            }
            true
        }
        None => false,
    };

    match (has_port, default_port) {
        (true, _) => Ok(authority.to_string()),
        (false, Some(port)) => Ok(format!("{}:{}", authority, port)),
        (false, None) => Err(ConnectionError::InvalidUrl(url.to_string())),
    }
}
