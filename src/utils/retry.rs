//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::interfaces::StorageError;

/// Backoff for writes that lost a race on the store.
///
/// - Min delay: 10ms
/// - Max delay: 1s
/// - Max attempts: 8
/// - Jitter enabled
pub fn store_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(8)
        .with_jitter()
}

/// Backoff for the admin CLI waiting out a busy database.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 10
/// - Jitter enabled
pub fn admin_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(10)
        .with_jitter()
}

/// Determines if a storage error is worth retrying.
///
/// Retryable:
/// - Database locked/busy and pool timeouts (another writer holds the lock)
/// - `SlotTaken`: a concurrent registration took the placement slot
///
/// Everything else (duplicates, missing rows, bad data) will fail the same
/// way on retry.
pub fn is_retryable(error: &StorageError) -> bool {
    error.is_retryable()
}
