use crate::domain::pending::PendingOperation;
use crate::domain::ports::StateStore;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct StoredEntry {
    record: PendingOperation,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process map-backed [`StateStore`] with TTL support.
///
/// Expiry is lazy (an entry past its TTL reads as absent and is removed on
/// read) plus a periodic background sweep that bounds memory. The sweep task
/// holds only a weak reference to the map, so dropping the store stops it.
pub struct InMemoryStateStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
    sweeper: Option<JoinHandle<()>>,
}

impl InMemoryStateStore {
    /// Creates a store with the default 60s sweep interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_sweep_interval(SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(interval: Duration) -> Self {
        let entries: Arc<RwLock<HashMap<String, StoredEntry>>> = Arc::default();
        let weak = Arc::downgrade(&entries);
        let sweeper = tokio::spawn(sweep_loop(weak, interval));
        Self {
            entries,
            sweeper: Some(sweeper),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryStateStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

async fn sweep_loop(entries: Weak<RwLock<HashMap<String, StoredEntry>>>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let now = Instant::now();
        let mut map = entries.write().await;
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        let removed = before - map.len();
        if removed > 0 {
            tracing::debug!(removed, "swept expired state entries");
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn set(
        &self,
        key: &str,
        record: PendingOperation,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut map = self.entries.write().await;
        map.insert(key.to_string(), StoredEntry { record, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingOperation>> {
        {
            let map = self.entries.read().await;
            match map.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Ok(Some(entry.record.clone()));
                }
                Some(_) => {}
            }
        }
        // Expired: evict under the write lock, re-checking in case of a race.
        let mut map = self.entries.write().await;
        if map.get(key).is_some_and(|e| e.is_expired(Instant::now())) {
            map.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let now = Instant::now();
        self.entries
            .write()
            .await
            .retain(|_, entry| !entry.is_expired(now));
        Ok(())
    }
}
