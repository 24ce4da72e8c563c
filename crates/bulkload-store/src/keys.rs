//! Key encoding utilities for `RocksDB`.

use bulkload_core::{DocumentId, IdError};

/// Create a document key from a document ID.
///
/// ULID bytes are big-endian, so key order equals id order.
#[must_use]
pub fn document_key(id: &DocumentId) -> [u8; 16] {
    id.to_bytes()
}

/// Decode a document key.
///
/// # Errors
///
/// Returns `IdError::InvalidLength` if the key is not 16 bytes.
pub fn document_id_from_key(key: &[u8]) -> Result<DocumentId, IdError> {
    DocumentId::from_slice(key)
}

/// Create a schema metadata key from a collection name.
#[must_use]
pub fn schema_key(collection: &str) -> Vec<u8> {
    collection.as_bytes().to_vec()
}
