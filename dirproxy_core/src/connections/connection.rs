use super::errors::ConnectionError;
use crate::storage::profile::DirectoryProfile;
use async_trait::async_trait;

/// An established proxy connection to a directory backend.
///
/// The registry owns every value of this type and is the only caller of
/// `close`; a close error is logged there and never travels further.
#[async_trait]
pub trait DirectoryConnection: Send + Sync {
    /// Address of the server this connection is bound to.
    fn endpoint(&self) -> &str;

    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Opens proxy connections for a profile (bind as the service account,
/// TLS negotiation and timeouts all live behind this trait).
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    async fn open(
        &self,
        profile: &DirectoryProfile,
    ) -> Result<Box<dyn DirectoryConnection>, ConnectionError>;
}
