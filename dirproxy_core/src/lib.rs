pub mod connections;
pub mod core;
pub mod storage;
pub mod utils;

// re‑export ergonomic entry points
pub use crate::core::error_record::{ErrorKind, ErrorRecord};
pub use crate::core::service::{DirectoryConnectionService, ServiceStatus};
pub use crate::core::{ConnectionHandle, HealthRecord, HealthStatus, ServiceError};
pub use storage::{
    AttributeStore, DirectoryProfile, FileAttributeStore, MemoryAttributeStore, ProfileCatalog,
    ProfileId, ProfileSource, ProfileStore,
};
