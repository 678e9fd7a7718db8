//! Latchkey Lock - Time-bounded distributed locks
//!
//! Mutually exclusive locks keyed by an application string, backed by any
//! store offering a conditional insert with TTL and a conditional delete.
//!
//! This crate provides:
//! - `LockStore`: the two-operation contract a backing store implements
//! - `AcquisitionEngine`: the poll-until-applied acquisition loop
//! - `LockSource`: schema provisioning plus `acquire` / `attempt_acquire`
//! - `Lock`: the ownership handle with exactly-once release
//!
//! ```rust,ignore
//! let source = LockSource::new(store);
//! let lock = source
//!     .acquire("job-42", Duration::from_secs(10), &cancel_after(Duration::from_secs(5)))
//!     .await?;
//! // ... critical section ...
//! lock.release().await?;
//! ```

pub mod attempt;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod owner;
pub mod source;
pub mod store;
pub mod ttl;

#[cfg(test)]
mod test_support;

pub use attempt::LockAttempt;
pub use cancel::{CancellationToken, cancel_after, canceled};
pub use engine::AcquisitionEngine;
pub use error::{LockError, LockReleaseError, Result};
pub use lock::{Lock, ReleaseLock, ReleaseOutcome, StoreReleaser};
pub use self::metrics::describe_lock_metrics;
pub use owner::OwnerId;
pub use source::{LockProvider, LockSource, LockSourceOptions};
pub use store::LockStore;
pub use ttl::LockTtl;
