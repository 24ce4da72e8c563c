//! Core types and utilities for bulkload.
//!
//! This crate provides the foundational types shared by the store drivers, the batch
//! mutation engine and the loader binary:
//!
//! - **Identifiers**: `DocumentId`, `DocumentIdAllocator`
//! - **Tenants**: `TenantName`
//! - **Documents**: `Document`, `Namespace`, `Filter`, `FieldUpdate`
//! - **Schema**: `DatabaseSchema`, `CollectionSpec`, `IndexSpec`
//! - **Configuration**: `EngineConfig`
//!
//! # Identifier ordering
//!
//! Document identifiers are monotonic ULIDs assigned by the client before submission. Sorting
//! by identifier therefore reproduces insertion order, which both the keyset pagination of the
//! copy path and the relationship linker rely on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod schema;
pub mod tenant;

pub use config::EngineConfig;
pub use document::{Document, FieldUpdate, Fields, Filter, Namespace};
pub use error::{BulkloadError, Result};
pub use ids::{DocumentId, DocumentIdAllocator, IdError};
pub use schema::{CollectionSpec, DatabaseSchema, IndexSpec};
pub use tenant::TenantName;
