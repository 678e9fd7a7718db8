//! Lock acquisition engine
//!
//! Turns store contention into an awaitable exclusive lock:
//! 1. draw a fresh owner id,
//! 2. loop: stop if cancelled, try the conditional insert, stop if it applied,
//!    otherwise wait one poll interval (racing the cancellation signal),
//! 3. hand back a `Lock` bound to the store's conditional delete.
//!
//! Only "not applied" is retried. A store error ends the acquisition at once.
//! The loop has no attempt limit; the caller bounds it with the token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{LockError, Result};
use crate::lock::{Lock, StoreReleaser};
use crate::metrics::{
    LOCK_ACQUIRE_WAIT_SECONDS, LOCK_ACQUIRED_TOTAL, LOCK_CANCELED_TOTAL, LOCK_CONTENTION_TOTAL,
};
use crate::owner::OwnerId;
use crate::store::LockStore;
use crate::ttl::LockTtl;

pub struct AcquisitionEngine {
    store: Arc<dyn LockStore>,
    releaser: Arc<StoreReleaser>,
    poll_interval: Duration,
}

impl AcquisitionEngine {
    pub fn new(store: Arc<dyn LockStore>, poll_interval: Duration) -> Self {
        Self {
            releaser: Arc::new(StoreReleaser::new(store.clone())),
            store,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `key` is acquired or `cancel` fires.
    ///
    /// Cancellation is observed before every insert and during every wait, so
    /// a cancelled call never leaves a record behind.
    pub async fn acquire(&self, key: &str, ttl: Duration, cancel: &CancellationToken) -> Result<Lock> {
        let ttl = LockTtl::from_duration(ttl)?;
        let owner_id = OwnerId::new();
        let started = Instant::now();
        let mut contended: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(self.canceled(key, contended));
            }

            if self.store.insert_if_absent(key, owner_id, ttl).await? {
                break;
            }

            contended += 1;
            metrics::counter!(LOCK_CONTENTION_TOTAL).increment(1);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.canceled(key, contended)),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        metrics::counter!(LOCK_ACQUIRED_TOTAL).increment(1);
        metrics::histogram!(LOCK_ACQUIRE_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(key = %key, owner_id = %owner_id, ttl_secs = ttl.as_secs(), retries = contended, "Lock acquired");

        Ok(self.bind(key, owner_id))
    }

    /// Single conditional insert without waiting.
    ///
    /// Returns `Ok(None)` when the key is held by someone else.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lock>> {
        let ttl = LockTtl::from_duration(ttl)?;
        let owner_id = OwnerId::new();

        if !self.store.insert_if_absent(key, owner_id, ttl).await? {
            metrics::counter!(LOCK_CONTENTION_TOTAL).increment(1);
            debug!(key = %key, "Lock is held, attempt not acquired");
            return Ok(None);
        }

        metrics::counter!(LOCK_ACQUIRED_TOTAL).increment(1);
        debug!(key = %key, owner_id = %owner_id, ttl_secs = ttl.as_secs(), "Lock acquired on first attempt");

        Ok(Some(self.bind(key, owner_id)))
    }

    fn bind(&self, key: &str, owner_id: OwnerId) -> Lock {
        Lock::new(key, owner_id, self.releaser.clone())
    }

    fn canceled(&self, key: &str, contended: u64) -> LockError {
        metrics::counter!(LOCK_CANCELED_TOTAL).increment(1);
        debug!(key = %key, retries = contended, "Lock acquisition canceled");
        LockError::Canceled {
            key: key.to_string(),
        }
    }
}
