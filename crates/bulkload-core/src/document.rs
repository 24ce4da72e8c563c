//! Documents, namespaces and filters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BulkloadError, Result};
use crate::DocumentId;

/// The field map of a document body.
pub type Fields = serde_json::Map<String, Value>;

/// A record stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Client-assigned identifier.
    pub id: DocumentId,

    /// Document body.
    pub fields: Fields,
}

impl Document {
    /// Create a document from an identifier and a field map.
    #[must_use]
    pub fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Create a document from an identifier and a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `BulkloadError::InvalidDocument` if `body` is not a JSON object.
    pub fn from_value(id: DocumentId, body: Value) -> Result<Self> {
        match body {
            Value::Object(fields) => Ok(Self { id, fields }),
            other => Err(BulkloadError::InvalidDocument(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A collection within a logical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Logical database name.
    pub database: String,

    /// Collection name.
    pub collection: String,
}

impl Namespace {
    /// Create a namespace.
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Return a sibling collection in the same database.
    #[must_use]
    pub fn sibling(&self, collection: impl Into<String>) -> Self {
        Self::new(self.database.clone(), collection)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Selects documents by their top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match every document.
    #[default]
    All,

    /// Match documents whose `field` equals `value`.
    Eq {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
}

impl Filter {
    /// Build an equality filter.
    #[must_use]
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against a document body.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::All => true,
            Self::Eq { field, value } => fields.get(field) == Some(value),
        }
    }
}

/// Sets one field on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    /// Target document.
    pub id: DocumentId,

    /// Field to overwrite.
    pub field: String,

    /// New value.
    pub value: Value,
}

impl FieldUpdate {
    /// Create a field update.
    #[must_use]
    pub fn set(id: DocumentId, field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id,
            field: field.into(),
            value: value.into(),
        }
    }
}
