// In-memory lock store
// Conditional insert/delete over a DashMap with per-record expiry

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use latchkey_common::{Configuration, StoreError};
use latchkey_lock::metrics::MEMORY_STORE_LOCKS;
use latchkey_lock::{LockStore, LockTtl, OwnerId};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// A held lock record
pub(crate) struct LockEntry {
    owner_id: OwnerId,
    expires_at: Instant,
}

impl LockEntry {
    // LockTtl is capped at 20 years, so the addition cannot overflow
    fn new(owner_id: OwnerId, ttl: LockTtl) -> Self {
        Self {
            owner_id,
            expires_at: Instant::now() + ttl.as_duration(),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local lock store.
///
/// Records past their TTL count as absent: a conditional insert overwrites
/// them and a conditional delete ignores them. They are physically removed by
/// `purge_expired`, either on demand or by the background sweeper.
pub struct MemoryLockStore {
    locks: Arc<DashMap<String, LockEntry>>,
    sweeper: Option<JoinHandle<()>>,
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLockStore {
    /// Create an empty store without a background sweeper
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            sweeper: None,
        }
    }

    /// Store with a sweeper running at the configured `store.sweep_interval_ms`
    pub fn from_config(config: &Configuration) -> Self {
        Self::new().with_sweeper(config.sweep_interval())
    }

    /// Start a background task purging expired records every `interval`.
    ///
    /// Must be called inside a tokio runtime. The task stops when the store is dropped.
    pub fn with_sweeper(mut self, interval: Duration) -> Self {
        if let Some(previous) = self.sweeper.take() {
            previous.abort();
        }

        let locks = self.locks.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                Self::purge(&locks);
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "MemoryLockStore expiry sweeper started");

        self.sweeper = Some(handle);
        self
    }

    /// Owner of the live record for `key`, if any
    pub fn owner_of(&self, key: &str) -> Option<OwnerId> {
        self.locks
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.owner_id)
    }

    /// Number of records physically held, expired ones included
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Remove every expired record, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        Self::purge(&self.locks)
    }

    fn purge(locks: &DashMap<String, LockEntry>) -> usize {
        let before = locks.len();
        locks.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(locks.len());

        if purged > 0 {
            debug!(count = purged, "Cleaned up expired lock entries");
        }
        metrics::gauge!(MEMORY_STORE_LOCKS).set(locks.len() as f64);
        purged
    }
}

impl Drop for MemoryLockStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        owner_id: OwnerId,
        ttl: LockTtl,
    ) -> Result<bool, StoreError> {
        let applied = match self.locks.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(LockEntry::new(owner_id, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LockEntry::new(owner_id, ttl));
                true
            }
        };

        if applied {
            debug!(key = %key, owner_id = %owner_id, "Lock record inserted");
            metrics::gauge!(MEMORY_STORE_LOCKS).set(self.locks.len() as f64);
        }
        Ok(applied)
    }

    async fn delete_if_owner(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError> {
        let removed = self
            .locks
            .remove_if(key, |_, entry| entry.owner_id == owner_id && !entry.is_expired())
            .is_some();

        if removed {
            debug!(key = %key, owner_id = %owner_id, "Lock record deleted");
            metrics::gauge!(MEMORY_STORE_LOCKS).set(self.locks.len() as f64);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl(secs: u64) -> LockTtl {
        LockTtl::from_secs(secs).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_delete() {
        let store = MemoryLockStore::new();
        let owner = OwnerId::new();

        assert!(store.insert_if_absent("key1", owner, ttl(60)).await.unwrap());
        assert_eq!(store.owner_of("key1"), Some(owner));
        assert!(store.delete_if_owner("key1", owner).await.unwrap());
        assert_eq!(store.owner_of("key1"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = MemoryLockStore::new();
        let owner1 = OwnerId::new();
        let owner2 = OwnerId::new();

        assert!(store.insert_if_absent("key1", owner1, ttl(60)).await.unwrap());
        // Another owner cannot insert
        assert!(!store.insert_if_absent("key1", owner2, ttl(60)).await.unwrap());
        // Nor can the same owner insert twice
        assert!(!store.insert_if_absent("key1", owner1, ttl(60)).await.unwrap());
        assert_eq!(store.owner_of("key1"), Some(owner1));
    }

    #[tokio::test]
    async fn test_delete_wrong_owner() {
        let store = MemoryLockStore::new();
        let owner1 = OwnerId::new();

        assert!(store.insert_if_absent("key1", owner1, ttl(60)).await.unwrap());
        assert!(!store.delete_if_owner("key1", OwnerId::new()).await.unwrap());
        assert!(store.delete_if_owner("key1", owner1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let store = MemoryLockStore::new();
        assert!(!store.delete_if_owner("nonexistent", OwnerId::new()).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_after_expiry() {
        let store = MemoryLockStore::new();
        let owner1 = OwnerId::new();
        let owner2 = OwnerId::new();

        assert!(store.insert_if_absent("key1", owner1, ttl(1)).await.unwrap());
        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(store.owner_of("key1"), None);
        assert!(!store.delete_if_owner("key1", owner1).await.unwrap());
        assert!(store.insert_if_absent("key1", owner2, ttl(60)).await.unwrap());
        assert!(!store.delete_if_owner("key1", owner1).await.unwrap());
        assert_eq!(store.owner_of("key1"), Some(owner2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_ttl_holds_the_key() {
        let store = MemoryLockStore::new();
        let owner = OwnerId::new();

        assert!(store.insert_if_absent("key1", owner, LockTtl::longest()).await.unwrap());
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;

        assert!(!store.insert_if_absent("key1", OwnerId::new(), ttl(60)).await.unwrap());
        assert_eq!(store.owner_of("key1"), Some(owner));
        assert!(store.delete_if_owner("key1", owner).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryLockStore::new();

        store.insert_if_absent("short", OwnerId::new(), ttl(1)).await.unwrap();
        store.insert_if_absent("long", OwnerId::new(), ttl(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.owner_of("long").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_records() {
        let store = MemoryLockStore::new().with_sweeper(Duration::from_millis(500));

        store.insert_if_absent("key1", OwnerId::new(), ttl(1)).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_single_winner() {
        let store = Arc::new(MemoryLockStore::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_if_absent("contended", OwnerId::new(), ttl(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
