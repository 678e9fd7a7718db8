//! Latchkey Store - Lock store implementations
//!
//! - `MemoryLockStore`: process-local store over a `DashMap`, for single-node
//!   deployments and tests
//! - `SqlLockStore`: shared store over PostgreSQL or SQLite via `sea-orm`

pub mod memory;
pub mod sql;

pub use memory::MemoryLockStore;
pub use sql::SqlLockStore;
