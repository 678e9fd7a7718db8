//! Lock owner identity
//!
//! A fresh `OwnerId` is drawn for every acquisition and stored next to the
//! key. Release presents it back to the store, which only deletes the record
//! when the ids match. It is a fencing *check* for the holder itself, not a
//! monotonic token usable by downstream resources.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Random 128-bit identifier of one lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Generate a new random owner id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OwnerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for OwnerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
