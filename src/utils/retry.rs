//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::storage::StorageError;

/// Standard backoff for ledger append races (sequence conflicts).
///
/// - Min delay: 10ms
/// - Max delay: 2s
/// - Max attempts: 10
/// - Jitter enabled
pub fn conflict_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(10)
        .with_jitter()
}

/// Determines if a storage error is retryable (sequence conflict only).
///
/// Retryable:
/// - `SequenceConflict`: another writer extended the chain first; a fresh
///   read may still succeed
///
/// Non-retryable: every other variant. Constraint failures such as
/// `LoginTaken` and `OrderExists` are final answers, and database errors
/// that are not append races will not clear by re-reading.
pub fn is_retryable(err: &StorageError) -> bool {
    matches!(err, StorageError::SequenceConflict { .. })
}
