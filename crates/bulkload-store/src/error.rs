//! Error types for bulkload storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Server error code a throttled request is reported with.
pub const RATE_EXCEEDED_CODE: i32 = 16500;

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store rejected some or all records because the request-rate budget was exceeded.
    ///
    /// `failed_indices` are positions within the submitted slice. Records at any other position
    /// were applied. An empty set means the whole request was rejected before anything was
    /// applied.
    #[error("request rate exceeded ({} records rejected)", failed_indices.len())]
    Throttled {
        /// Positions of the rejected records.
        failed_indices: Vec<usize>,
    },

    /// A record in a bulk write failed for a reason other than throttling.
    #[error("bulk write failed at index {index}: {message}")]
    BulkWrite {
        /// Position of the first failing record.
        index: usize,
        /// Failure description.
        message: String,
    },

    /// The store could not be reached or opened.
    #[error("connection error: {0}")]
    Connection(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// A throttle rejecting the whole request.
    #[must_use]
    pub fn throttled_request() -> Self {
        Self::Throttled {
            failed_indices: Vec::new(),
        }
    }

    /// Whether this error is the retryable rate-limit kind.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// Server error code, when the error carries one.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Throttled { .. } => Some(RATE_EXCEEDED_CODE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttled_is_retryable() {
        assert!(StoreError::throttled_request().is_throttled());
        assert_eq!(
            StoreError::throttled_request().code(),
            Some(RATE_EXCEEDED_CODE)
        );
        assert!(!StoreError::Database("boom".into()).is_throttled());
        assert!(!StoreError::BulkWrite {
            index: 3,
            message: "duplicate key".into()
        }
        .is_throttled());
    }

    #[test]
    fn display_counts_rejected_records() {
        let err = StoreError::Throttled {
            failed_indices: vec![1, 2, 3],
        };
        assert_eq!(err.to_string(), "request rate exceeded (3 records rejected)");
    }
}
