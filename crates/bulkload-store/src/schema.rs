//! Column family layout of a `RocksDB`-backed logical database.
//!
//! Each logical database is its own `RocksDB` instance. Collections map to column families
//! named `coll.<collection>`; declared schemas are recorded in a metadata column family.

/// Column family holding applied `CollectionSpec`s, keyed by collection name.
pub const SCHEMA_CF: &str = "meta.schema";

/// Prefix of collection column families.
pub const COLLECTION_PREFIX: &str = "coll.";

/// Column family name of a collection.
#[must_use]
pub fn collection_cf(collection: &str) -> String {
    format!("{COLLECTION_PREFIX}{collection}")
}

/// Column families every logical database is opened with.
#[must_use]
pub fn base_column_families() -> Vec<String> {
    vec![SCHEMA_CF.to_string()]
}
