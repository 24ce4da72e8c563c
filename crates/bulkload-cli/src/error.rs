//! Loader error type.

use bulkload_core::BulkloadError;
use bulkload_engine::EngineError;
use bulkload_store::StoreError;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors surfaced by the `bulkload` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Unreadable or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A job failed inside the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The store could not be opened or queried.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid domain input.
    #[error(transparent)]
    Core(#[from] BulkloadError),
}
