//! Collection and index definitions applied when a tenant database is provisioned.

use serde::{Deserialize, Serialize};

/// An index declared on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed top-level field.
    pub field: String,

    /// Whether values must be unique within the collection.
    #[serde(default)]
    pub unique: bool,
}

/// A collection declared by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,

    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// Declare a collection without indexes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Add an index on `field`.
    #[must_use]
    pub fn with_index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(IndexSpec {
            field: field.into(),
            unique: false,
        });
        self
    }

    /// Add a unique index on `field`.
    #[must_use]
    pub fn with_unique_index(mut self, field: impl Into<String>) -> Self {
        self.indexes.push(IndexSpec {
            field: field.into(),
            unique: true,
        });
        self
    }
}

/// The set of collections a logical database must contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// Declared collections.
    pub collections: Vec<CollectionSpec>,
}

impl DatabaseSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection.
    #[must_use]
    pub fn with_collection(mut self, collection: CollectionSpec) -> Self {
        self.collections.push(collection);
        self
    }

    /// The schema every tenant database receives.
    #[must_use]
    pub fn tenant_default() -> Self {
        Self::new().with_collection(
            CollectionSpec::new("schools")
                .with_unique_index("SchoolId")
                .with_index("SchoolName"),
        )
    }

    /// Names of all declared collections.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }
}
