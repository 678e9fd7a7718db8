//! Non-blocking lock attempt outcome

use crate::lock::Lock;

/// Result of a single, non-waiting acquisition attempt
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(Lock),
    /// The key was held by someone else
    NotAcquired,
}

impl LockAttempt {
    pub fn was_successful(&self) -> bool {
        matches!(self, LockAttempt::Acquired(_))
    }

    pub fn lock(&self) -> Option<&Lock> {
        match self {
            LockAttempt::Acquired(lock) => Some(lock),
            LockAttempt::NotAcquired => None,
        }
    }

    pub fn into_lock(self) -> Option<Lock> {
        match self {
            LockAttempt::Acquired(lock) => Some(lock),
            LockAttempt::NotAcquired => None,
        }
    }
}

impl From<Option<Lock>> for LockAttempt {
    fn from(value: Option<Lock>) -> Self {
        match value {
            Some(lock) => LockAttempt::Acquired(lock),
            None => LockAttempt::NotAcquired,
        }
    }
}
