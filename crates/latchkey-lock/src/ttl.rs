//! Lock time-to-live
//!
//! Stores persist TTLs as whole seconds. Sub-second remainders round up so a
//! short TTL never collapses to zero, which several stores read as "no expiry".
//! The upper bound is the largest TTL Cassandra accepts (20 years), which also
//! keeps `now + ttl` well inside `Instant` and epoch-millis `i64` arithmetic.

use std::time::Duration;

use crate::error::{LockError, Result};

/// Store-enforced maximum holding time of a lock, in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockTtl(u64);

impl LockTtl {
    /// Longest accepted TTL, in seconds
    pub const MAX_SECS: u64 = 630_720_000;

    /// Round `ttl` up to whole seconds; zero and anything above `MAX_SECS` is rejected
    pub fn from_duration(ttl: Duration) -> Result<Self> {
        if ttl.is_zero() {
            return Err(LockError::InvalidTtl(ttl));
        }

        let mut secs = ttl.as_secs();
        if ttl.subsec_nanos() > 0 {
            secs = secs.saturating_add(1);
        }
        if secs > Self::MAX_SECS {
            return Err(LockError::InvalidTtl(ttl));
        }
        Ok(Self(secs))
    }

    pub fn longest() -> Self {
        Self(Self::MAX_SECS)
    }

    pub fn from_secs(secs: u64) -> Result<Self> {
        Self::from_duration(Duration::from_secs(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}
