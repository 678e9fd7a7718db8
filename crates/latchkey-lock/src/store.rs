//! Lock Store contract
//!
//! The whole protocol rests on two atomic operations a backing store must
//! offer, plus passive expiry:
//! - `insert_if_absent`: create the record for a key only when no live record
//!   exists (an expired one counts as absent). Concurrent racers on the same
//!   key see exactly one `true` per period of absence.
//! - `delete_if_owner`: remove the record only when its owner id matches.
//! - Records vanish on their own once their TTL elapses.
//!
//! Any store with compare-and-swap writes and server-side TTL fits: Cassandra
//! lightweight transactions, a unique index plus TTL collection, an upsert
//! guarded on expiry, or a key-value CAS.

use async_trait::async_trait;
use latchkey_common::StoreError;

use crate::owner::OwnerId;
use crate::ttl::LockTtl;

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create the table/collection if it does not exist yet.
    ///
    /// Idempotent and safe to call concurrently from multiple processes.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Atomically create the record for `key` unless a live one exists.
    ///
    /// Returns whether the insert took effect.
    async fn insert_if_absent(
        &self,
        key: &str,
        owner_id: OwnerId,
        ttl: LockTtl,
    ) -> Result<bool, StoreError>;

    /// Atomically remove the record for `key` if it is owned by `owner_id`.
    ///
    /// Returns `false` when the key is absent or held by another owner.
    async fn delete_if_owner(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError>;
}
