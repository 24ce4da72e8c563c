//! Identifier types for bulkload.
//!
//! Documents are addressed by ULIDs. The allocator hands out strictly increasing values so that
//! identifier order equals allocation order, even for many ids minted in the same millisecond.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

/// A document identifier using ULID for time-ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(Ulid);

impl DocumentId {
    /// Create a new `DocumentId` from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Generate a new `DocumentId` with the current timestamp.
    ///
    /// Ids generated this way are not guaranteed to be ordered within one millisecond; use a
    /// [`DocumentIdAllocator`] when insertion order matters.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Return the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Return the bytes of the ULID (16 bytes, big-endian, sort-preserving).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Create a `DocumentId` from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }

    /// Create a `DocumentId` from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidLength` if the slice is not exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            len: bytes.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl FromStr for DocumentId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
        Ok(Self(ulid))
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0.to_string()
    }
}

/// Hands out strictly increasing document identifiers.
///
/// One allocator is shared by every insert a job performs, so ids across chunks and retries
/// keep their allocation order.
#[derive(Default)]
pub struct DocumentIdAllocator {
    generator: Mutex<Generator>,
}

impl fmt::Debug for DocumentIdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentIdAllocator").finish_non_exhaustive()
    }
}

impl DocumentIdAllocator {
    /// Create a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Exhausted` if the random component overflowed within one millisecond.
    pub fn next_id(&self) -> Result<DocumentId, IdError> {
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        generator
            .generate()
            .map(DocumentId)
            .map_err(|_| IdError::Exhausted)
    }

    /// Allocate `count` consecutive identifiers.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Exhausted` if the generator overflowed.
    pub fn next_ids(&self, count: usize) -> Result<Vec<DocumentId>, IdError> {
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        (0..count)
            .map(|_| {
                generator
                    .generate()
                    .map(DocumentId)
                    .map_err(|_| IdError::Exhausted)
            })
            .collect()
    }
}

/// Errors that can occur when parsing or allocating identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,

    /// A binary identifier had the wrong length.
    #[error("invalid identifier length: {len} bytes")]
    InvalidLength {
        /// The length that was supplied.
        len: usize,
    },

    /// The monotonic generator ran out of values for the current millisecond.
    #[error("identifier space exhausted for the current millisecond")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrip() {
        let id = DocumentId::generate();
        let parsed = DocumentId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn document_id_serde_json() {
        let id = DocumentId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert_eq!(
            DocumentId::from_slice(&[0u8; 5]),
            Err(IdError::InvalidLength { len: 5 })
        );
    }

    #[test]
    fn allocator_debug_hides_generator_state() {
        let allocator = DocumentIdAllocator::new();
        allocator.next_id().unwrap();
        assert_eq!(format!("{allocator:?}"), "DocumentIdAllocator { .. }");
    }

    #[test]
    fn allocator_is_strictly_increasing() {
        let allocator = DocumentIdAllocator::new();
        let ids = allocator.next_ids(1000).unwrap();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        let next = allocator.next_id().unwrap();
        assert!(next > ids[999]);
    }

    #[test]
    fn byte_order_matches_id_order() {
        let allocator = DocumentIdAllocator::new();
        let a = allocator.next_id().unwrap();
        let b = allocator.next_id().unwrap();
        assert!(a.to_bytes() < b.to_bytes());
    }
}
