#![allow(dead_code)]

pub mod fake_backend;

use dirproxy_core::{
    AttributeStore, DirectoryConnectionService, DirectoryProfile, MemoryAttributeStore,
    ProfileCatalog,
};
use fake_backend::FakeBackend;
use log::LevelFilter;
use std::sync::Arc;

/// Logs appear only with `-- --nocapture` or when the test fails.
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// The default profile plus "corp" and "lab".
pub fn catalog() -> Arc<ProfileCatalog> {
    Arc::new(ProfileCatalog::new([
        DirectoryProfile::new("", vec!["ldap://default.example:389".into()]),
        DirectoryProfile::new("corp", vec!["ldaps://dc1.corp.example".into()]),
        DirectoryProfile::new("lab", vec!["ldap://lab.example".into()]),
    ]))
}

/// An initialised service over `backend` and `store`.
pub fn open_service(
    backend: Arc<FakeBackend>,
    store: Arc<dyn AttributeStore>,
) -> DirectoryConnectionService {
    let service = DirectoryConnectionService::new(backend);
    service
        .init(catalog(), store)
        .expect("init should succeed");
    service
}

pub fn memory_store() -> Arc<MemoryAttributeStore> {
    Arc::new(MemoryAttributeStore::new())
}
