//! Lock handle
//!
//! A `Lock` exists only after the store confirmed the conditional insert. It
//! carries the key, the owner id and a one-shot release capability. The first
//! release consumes the capability whatever the outcome, so the handle can
//! never loop on a failing delete; later releases are no-ops.
//!
//! Dropping an unreleased handle schedules the release on the current tokio
//! runtime. Drop never panics and never reports errors to the caller; use
//! [`Lock::release`] to observe the outcome.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use latchkey_common::StoreError;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::LockReleaseError;
use crate::metrics::{LOCK_RELEASE_ERRORS_TOTAL, LOCK_RELEASED_TOTAL};
use crate::owner::OwnerId;
use crate::store::LockStore;

/// Capability to give a lock back to its store
#[async_trait]
pub trait ReleaseLock: Send + Sync {
    /// Delete the record for `key` if it is still owned by `owner_id`
    async fn release(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError>;
}

/// Release capability backed by a `LockStore`'s conditional delete
pub struct StoreReleaser {
    store: Arc<dyn LockStore>,
}

impl StoreReleaser {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReleaseLock for StoreReleaser {
    async fn release(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError> {
        self.store.delete_if_owner(key, owner_id).await
    }
}

/// Result of releasing a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The record was deleted
    Released,
    /// The record was gone or belonged to someone else (TTL elapsed, key taken over)
    NotHeld,
    /// This handle had already been released; the store was not called
    AlreadyReleased,
}

impl ReleaseOutcome {
    /// Whether this call removed the record from the store
    pub fn applied(self) -> bool {
        self == ReleaseOutcome::Released
    }

    fn as_str(self) -> &'static str {
        match self {
            ReleaseOutcome::Released => "released",
            ReleaseOutcome::NotHeld => "not_held",
            ReleaseOutcome::AlreadyReleased => "already_released",
        }
    }
}

/// An exclusively held, time-bounded lock on a key
pub struct Lock {
    key: String,
    owner_id: OwnerId,
    releaser: Mutex<Option<Arc<dyn ReleaseLock>>>,
}

impl Lock {
    pub fn new(key: impl Into<String>, owner_id: OwnerId, releaser: Arc<dyn ReleaseLock>) -> Self {
        Self {
            key: key.into(),
            owner_id,
            releaser: Mutex::new(Some(releaser)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn is_released(&self) -> bool {
        self.releaser.lock().is_none()
    }

    /// Release the lock.
    ///
    /// Only the first call reaches the store. `Ok(NotHeld)` is expected when
    /// the TTL elapsed and the key may have been re-acquired by someone else.
    /// A store failure is returned as `LockReleaseError`; the handle is
    /// released all the same.
    pub async fn release(&self) -> Result<ReleaseOutcome, LockReleaseError> {
        let Some(releaser) = self.take_releaser() else {
            return Ok(ReleaseOutcome::AlreadyReleased);
        };

        match releaser.release(&self.key, self.owner_id).await {
            Ok(applied) => {
                let outcome = if applied {
                    ReleaseOutcome::Released
                } else {
                    ReleaseOutcome::NotHeld
                };
                metrics::counter!(LOCK_RELEASED_TOTAL, "outcome" => outcome.as_str()).increment(1);
                debug!(key = %self.key, owner_id = %self.owner_id, outcome = outcome.as_str(), "Lock released");
                Ok(outcome)
            }
            Err(source) => {
                metrics::counter!(LOCK_RELEASE_ERRORS_TOTAL).increment(1);
                warn!(key = %self.key, owner_id = %self.owner_id, error = %source, "Lock release failed");
                Err(LockReleaseError {
                    key: self.key.clone(),
                    owner_id: self.owner_id,
                    source,
                })
            }
        }
    }

    fn take_releaser(&self) -> Option<Arc<dyn ReleaseLock>> {
        self.releaser.lock().take()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("owner_id", &self.owner_id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let Some(releaser) = self.releaser.get_mut().take() else {
            return;
        };

        let key = std::mem::take(&mut self.key);
        let owner_id = self.owner_id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match releaser.release(&key, owner_id).await {
                        Ok(applied) => {
                            let outcome = if applied {
                                ReleaseOutcome::Released
                            } else {
                                ReleaseOutcome::NotHeld
                            };
                            metrics::counter!(LOCK_RELEASED_TOTAL, "outcome" => outcome.as_str())
                                .increment(1);
                            debug!(key = %key, owner_id = %owner_id, outcome = outcome.as_str(), "Lock released on drop");
                        }
                        Err(e) => {
                            metrics::counter!(LOCK_RELEASE_ERRORS_TOTAL).increment(1);
                            warn!(key = %key, owner_id = %owner_id, error = %e, "Lock release on drop failed, record expires with its TTL");
                        }
                    }
                });
            }
            Err(_) => {
                warn!(key = %key, owner_id = %owner_id, "Lock dropped outside a tokio runtime, record expires with its TTL");
            }
        }
    }
}
