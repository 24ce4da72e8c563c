//! Document store drivers for bulkload.
//!
//! This crate defines the contract the batch mutation engine drives ([`DocumentStore`]) and
//! ships two implementations:
//!
//! - [`RocksStore`] (feature `rocksdb-backend`, on by default): one `RocksDB` instance per
//!   logical database under a root directory, one column family per collection, CBOR values.
//! - [`MemoryStore`]: an in-process store with scripted fault injection, used by tests and
//!   dry runs to reproduce throttling sequences exactly.
//!
//! # Partial failure reporting
//!
//! Bulk writes are unordered: one rejected record never aborts the others. When records are
//! rejected because the request-rate budget was exceeded, the store returns
//! [`StoreError::Throttled`] with the positions of the rejected records; every other position
//! was applied. Any non-throttle rejection is reported as [`StoreError::BulkWrite`] and is fatal.
//!
//! # Example
//!
//! ```no_run
//! use bulkload_core::{DocumentIdAllocator, Document, Namespace};
//! use bulkload_store::{DocumentStore, RocksStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RocksStore::open("/tmp/bulkload")?;
//! let ids = DocumentIdAllocator::new();
//! let ns = Namespace::new("tenant_acme", "users");
//!
//! let doc = Document::from_value(ids.next_id()?, serde_json::json!({"UserName": "ada"}))?;
//! store.insert_many(&ns, &[doc]).await?;
//! assert_eq!(store.count(&ns).await?, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError, RATE_EXCEEDED_CODE};
pub use memory::{Fault, MemoryStore, Operation, StoreStats};
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use bulkload_core::{DatabaseSchema, Document, DocumentId, FieldUpdate, Filter, Namespace};

/// The storage trait the mutation engine drives.
///
/// A value implementing this trait is a live connection; it is released when the last owner
/// drops it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the logical databases that currently exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Create the collections and indexes declared by `schema` in `database`.
    ///
    /// Creates the database if needed. Applying the same schema twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn apply_schema(&self, database: &str, schema: &DatabaseSchema) -> Result<()>;

    /// Insert documents as one unordered batch.
    ///
    /// # Errors
    ///
    /// - `StoreError::Throttled` with the positions of rejected records.
    /// - `StoreError::BulkWrite` if any record failed for another reason (e.g. duplicate id).
    async fn insert_many(&self, ns: &Namespace, documents: &[Document]) -> Result<()>;

    /// Identifiers of up to `limit` documents matching `filter`, in ascending id order.
    ///
    /// # Errors
    ///
    /// `StoreError::Throttled` (with no indices) if the read was rejected.
    async fn find_ids(&self, ns: &Namespace, filter: &Filter, limit: usize)
        -> Result<Vec<DocumentId>>;

    /// Up to `limit` documents with ids strictly greater than `after`, in ascending id order.
    ///
    /// # Errors
    ///
    /// `StoreError::Throttled` (with no indices) if the read was rejected.
    async fn find_page(
        &self,
        ns: &Namespace,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Identifier of the most recently inserted document, or `None` for an empty collection.
    ///
    /// # Errors
    ///
    /// `StoreError::Throttled` (with no indices) if the read was rejected.
    async fn last_id(&self, ns: &Namespace) -> Result<Option<DocumentId>>;

    /// Delete exactly the given documents; returns how many existed.
    ///
    /// # Errors
    ///
    /// `StoreError::Throttled` with the positions of ids that were not deleted.
    async fn delete_many(&self, ns: &Namespace, ids: &[DocumentId]) -> Result<u64>;

    /// Apply field updates; returns how many target documents existed.
    ///
    /// # Errors
    ///
    /// `StoreError::Throttled` with the positions of updates that were not applied.
    async fn update_many(&self, ns: &Namespace, updates: &[FieldUpdate]) -> Result<u64>;

    /// Number of documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count(&self, ns: &Namespace) -> Result<u64>;
}
