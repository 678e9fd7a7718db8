//! Lock error types

use std::time::Duration;

use latchkey_common::StoreError;

use crate::owner::OwnerId;

/// Error returned by lock acquisition
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The cancellation signal fired before the key could be taken; nothing was written
    #[error("lock acquisition for '{key}' was canceled")]
    Canceled { key: String },

    #[error("invalid lock ttl {0:?}: must be between 1s and {max}s", max = crate::ttl::LockTtl::MAX_SECS)]
    InvalidTtl(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LockError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, LockError::Canceled { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockError>;

/// The store could not be asked to delete the lock record.
///
/// Cleanup did not provably happen: the record may still exist until its TTL
/// elapses. The handle is consumed regardless; retrying is the caller's call.
#[derive(Debug, thiserror::Error)]
#[error("failed to release lock '{key}' (owner {owner_id}): {source}")]
pub struct LockReleaseError {
    pub key: String,
    pub owner_id: OwnerId,
    #[source]
    pub source: StoreError,
}
