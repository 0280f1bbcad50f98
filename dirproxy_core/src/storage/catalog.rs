use std::collections::BTreeMap;
use std::io;

use super::profile::{DirectoryProfile, ProfileId};
use super::store::ProfileStore;

/// Where the service looks up the configuration behind a profile id.
pub trait ProfileSource: Send + Sync {
    fn resolve_profile(&self, id: &ProfileId) -> Option<DirectoryProfile>;

    fn profile_ids(&self) -> Vec<ProfileId>;
}

/// Fixed, in-memory set of profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: BTreeMap<ProfileId, DirectoryProfile>,
}

impl ProfileCatalog {
    pub fn new(profiles: impl IntoIterator<Item = DirectoryProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
        }
    }

    /// Snapshot of everything currently stored on disk.
    pub fn from_store(store: &ProfileStore) -> io::Result<Self> {
        Ok(Self::new(store.list()?))
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &DirectoryProfile> {
        self.profiles.values()
    }
}

impl ProfileSource for ProfileCatalog {
    fn resolve_profile(&self, id: &ProfileId) -> Option<DirectoryProfile> {
        self.profiles.get(id).cloned()
    }

    fn profile_ids(&self) -> Vec<ProfileId> {
        self.profiles.keys().cloned().collect()
    }
}
