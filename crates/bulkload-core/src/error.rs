//! Error types for bulkload core types.

use crate::ids::IdError;

/// Result type for bulkload core operations.
pub type Result<T> = std::result::Result<T, BulkloadError>;

/// Errors that can occur while building or validating core values.
#[derive(Debug, thiserror::Error)]
pub enum BulkloadError {
    /// Tenant name failed validation.
    #[error("invalid tenant name {name:?}: {reason}")]
    InvalidTenantName {
        /// The rejected input.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A document body was not a JSON object.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}
