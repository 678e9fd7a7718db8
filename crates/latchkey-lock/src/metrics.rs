// Metric names and descriptions for lock acquisition and release
// Recorded through the `metrics` facade; the host installs the recorder

use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const LOCK_ACQUIRED_TOTAL: &str = "latchkey_lock_acquired_total";
pub const LOCK_CONTENTION_TOTAL: &str = "latchkey_lock_contention_total";
pub const LOCK_CANCELED_TOTAL: &str = "latchkey_lock_canceled_total";
pub const LOCK_RELEASED_TOTAL: &str = "latchkey_lock_released_total";
pub const LOCK_RELEASE_ERRORS_TOTAL: &str = "latchkey_lock_release_errors_total";
pub const LOCK_ACQUIRE_WAIT_SECONDS: &str = "latchkey_lock_acquire_wait_seconds";
pub const MEMORY_STORE_LOCKS: &str = "latchkey_memory_store_locks";

/// Register all lock metric descriptions
/// Should be called once at application startup
pub fn describe_lock_metrics() {
    describe_counter!(LOCK_ACQUIRED_TOTAL, "Total number of locks acquired");
    describe_counter!(
        LOCK_CONTENTION_TOTAL,
        "Total number of conditional inserts that found the key held"
    );
    describe_counter!(
        LOCK_CANCELED_TOTAL,
        "Total number of acquisitions abandoned through cancellation"
    );
    describe_counter!(
        LOCK_RELEASED_TOTAL,
        "Total number of lock releases, labelled by outcome"
    );
    describe_counter!(
        LOCK_RELEASE_ERRORS_TOTAL,
        "Total number of releases that failed to reach the store"
    );
    describe_histogram!(
        LOCK_ACQUIRE_WAIT_SECONDS,
        "Time spent waiting for a lock in seconds"
    );
    describe_gauge!(
        MEMORY_STORE_LOCKS,
        "Number of records held by the in-memory lock store"
    );
}
