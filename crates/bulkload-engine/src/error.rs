//! Error types for the mutation engine.

use bulkload_core::{BulkloadError, IdError};
use bulkload_store::StoreError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the mutation engine.
///
/// Throttling is absorbed internally as retries and never appears here except as
/// [`EngineError::RetriesExhausted`]. When that or any other error is returned from a write, an
/// unknown number of records may already have been applied; callers that need exact state must
/// re-query the store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A non-retryable store error (validation, connectivity, duplicate key).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The store kept throttling past the attempt ceiling.
    #[error("{operation} on {namespace} still throttled after {attempts} attempts ({outstanding} records outstanding)")]
    RetriesExhausted {
        /// Which operation gave up.
        operation: &'static str,
        /// Target collection.
        namespace: String,
        /// Submissions made, including the first.
        attempts: u32,
        /// Records still unapplied when the engine gave up.
        outstanding: usize,
    },

    /// The store reported a failure position outside the submitted batch.
    #[error("store reported failure index {index} for a batch of {batch_len}")]
    InvalidFailureReport {
        /// The out-of-range position.
        index: usize,
        /// Size of the submitted batch.
        batch_len: usize,
    },

    /// A paginated loop stopped making progress.
    #[error("{operation} on {namespace} made no progress after {cycles} cycles")]
    Stalled {
        /// Which operation stalled.
        operation: &'static str,
        /// Target collection.
        namespace: String,
        /// Consecutive cycles without progress.
        cycles: u32,
    },

    /// A copy named the same collection as source and destination.
    #[error("cannot copy {namespace} onto itself")]
    CopyOntoItself {
        /// The collection named twice.
        namespace: String,
    },

    /// Invalid input or configuration.
    #[error(transparent)]
    Core(#[from] BulkloadError),
}

impl From<IdError> for EngineError {
    fn from(err: IdError) -> Self {
        Self::Core(BulkloadError::InvalidId(err))
    }
}
