//! Error types for lock stores
//!
//! `StoreError` is the single failure type every `LockStore` implementation
//! reports. It always means "the store could not be asked"; a conditional
//! write that simply did not apply is a normal `Ok(false)`, never an error.

/// Transport or communication failure from a backing lock store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unsupported store: {0}")]
    Unsupported(String),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
