pub mod connection_registry;
pub mod error_record;
pub mod errors;
pub mod failure_tracker;
pub mod health;
pub mod service;

// Re-export the modules here for easy import elsewhere.
pub use connection_registry::*;
pub use error_record::*;
pub use errors::*;
pub use failure_tracker::*;
pub use health::{HealthRecord, HealthStatus};
pub use service::*;
