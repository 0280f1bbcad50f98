//! A deterministic **in‑process stand‑in** for a directory server.
//!
//! *  **From the test’s perspective**
//!    * Decide which profiles refuse connections with `fail_profile` /
//!      `heal_profile`.
//!    * Hold opens in flight with `hold_opens`, then let them finish one at a
//!      time with `release_one`.
//!    * Count how often the service really opened or closed something.
//!
//! Nothing here touches the network, so the real registry and service
//! machinery can be exercised without a directory server.

use async_trait::async_trait;
use dirproxy_core::connections::{DirectoryBackend, DirectoryConnection, ConnectionError};
use dirproxy_core::{DirectoryProfile, ProfileId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Default)]
pub struct FakeBackend {
    opens: Mutex<HashMap<ProfileId, usize>>,
    closes: Arc<AtomicUsize>,
    refusing: Mutex<HashSet<ProfileId>>,
    broken_close: Mutex<HashSet<ProfileId>>,
    open_delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every open sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::default()
        }
    }

    /// Opens block until the test calls `release_one`.
    pub fn hold_opens() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release_one(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn fail_profile(&self, id: &str) {
        self.refusing.lock().unwrap().insert(ProfileId::from(id));
    }

    pub fn heal_profile(&self, id: &str) {
        self.refusing.lock().unwrap().remove(&ProfileId::from(id));
    }

    /// Connections for `id` report an error when closed.
    pub fn break_close(&self, id: &str) {
        self.broken_close.lock().unwrap().insert(ProfileId::from(id));
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().values().sum()
    }

    pub fn open_count_for(&self, id: &str) -> usize {
        self.opens
            .lock()
            .unwrap()
            .get(&ProfileId::from(id))
            .copied()
            .unwrap_or(0)
    }

    /// Resolves once `n` opens have started.
    pub async fn wait_for_opens(&self, n: usize) {
        while self.open_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Number of backend connections whose close was attempted.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryBackend for FakeBackend {
    async fn open(
        &self,
        profile: &DirectoryProfile,
    ) -> Result<Box<dyn DirectoryConnection>, ConnectionError> {
        *self
            .opens
            .lock()
            .unwrap()
            .entry(profile.id.clone())
            .or_default() += 1;

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        if self.refusing.lock().unwrap().contains(&profile.id) {
            return Err(ConnectionError::Other(format!(
                "connection refused by {}",
                profile.urls.join(",")
            )));
        }

        Ok(Box::new(FakeConnection {
            endpoint: format!("fake://{}", profile.id),
            closes: self.closes.clone(),
            broken: self.broken_close.lock().unwrap().contains(&profile.id),
        }))
    }
}

pub struct FakeConnection {
    endpoint: String,
    closes: Arc<AtomicUsize>,
    broken: bool,
}

#[async_trait]
impl DirectoryConnection for FakeConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(ConnectionError::Other("unbind rejected".into()));
        }
        Ok(())
    }
}
