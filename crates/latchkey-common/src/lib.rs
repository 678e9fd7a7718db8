//! Latchkey Common - Shared types and configuration
//!
//! This crate provides the foundational pieces used across all Latchkey components:
//! - `StoreError`: transport/communication failures reported by lock stores
//! - `Configuration`: layered settings (file + environment)
//! - Default values for lock polling and store maintenance

pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::Configuration;
pub use error::{Result, StoreError};

/// Delay between two conditional-insert attempts while a key is contended
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default table/collection name holding lock records
pub const DEFAULT_LOCKS_TABLE: &str = "locks";

/// Default cadence of the in-memory store's expiry sweeper
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Default SQL connection pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "latchkey";
