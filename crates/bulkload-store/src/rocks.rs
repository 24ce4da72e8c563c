//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `DocumentStore` trait. Every
//! logical database is a separate `RocksDB` instance in a sub-directory of the store root and
//! is opened lazily on first use. `RocksDB` never throttles, so this backend only ever reports
//! non-retryable errors.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use tracing::debug;

use bulkload_core::{
    CollectionSpec, DatabaseSchema, Document, DocumentId, FieldUpdate, Fields, Filter, Namespace,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{base_column_families, collection_cf, SCHEMA_CF};
use crate::DocumentStore;

type Db = DBWithThreadMode<MultiThreaded>;

#[allow(clippy::needless_pass_by_value)]
fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    root: PathBuf,
    databases: RwLock<HashMap<String, Arc<Db>>>,
}

impl RocksStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the root directory cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", root.display())))?;

        Ok(Self {
            root,
            databases: RwLock::new(HashMap::new()),
        })
    }

    /// Collections and indexes recorded for `database`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    pub fn schema(&self, database: &str) -> Result<Vec<CollectionSpec>> {
        let Some(db) = self.existing_database(database)? else {
            return Ok(Vec::new());
        };
        let cf = Self::cf(&db, SCHEMA_CF)?;

        db.iterator_cf(&cf, IteratorMode::Start)
            .map(|item| {
                let (_, value) = item.map_err(db_err)?;
                Self::deserialize(&value)
            })
            .collect()
    }

    fn database_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(&['/', '\\', '\0'][..])
        {
            return Err(StoreError::Database(format!(
                "invalid database name: {name:?}"
            )));
        }
        Ok(self.root.join(name))
    }

    fn cached(&self, name: &str) -> Option<Arc<Db>> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Open a logical database, creating it if it does not exist.
    fn open_database(&self, name: &str) -> Result<Arc<Db>> {
        if let Some(db) = self.cached(name) {
            return Ok(db);
        }
        let path = self.database_path(name)?;

        let mut databases = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = databases.get(name) {
            return Ok(Arc::clone(db));
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        // Listing fails for a database that does not exist yet.
        let mut families = Db::list_cf(&opts, &path).unwrap_or_default();
        for base in base_column_families() {
            if !families.contains(&base) {
                families.push(base);
            }
        }
        let descriptors: Vec<_> = families
            .into_iter()
            .map(|family| ColumnFamilyDescriptor::new(family, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &path, descriptors)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let db = Arc::new(db);
        databases.insert(name.to_string(), Arc::clone(&db));

        debug!(database = name, path = %path.display(), "Opened RocksDB database");
        Ok(db)
    }

    /// Open a logical database only if it already exists on disk.
    fn existing_database(&self, name: &str) -> Result<Option<Arc<Db>>> {
        if let Some(db) = self.cached(name) {
            return Ok(Some(db));
        }
        if !self.database_path(name)?.join("CURRENT").exists() {
            return Ok(None);
        }
        self.open_database(name).map(Some)
    }

    /// Get a column family handle.
    fn cf<'a>(db: &'a Db, name: &str) -> Result<Arc<BoundColumnFamily<'a>>> {
        db.cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Get a collection's column family, creating it if asked to.
    fn collection<'a>(
        db: &'a Db,
        collection: &str,
        create: bool,
    ) -> Result<Option<Arc<BoundColumnFamily<'a>>>> {
        let name = collection_cf(collection);
        if let Some(cf) = db.cf_handle(&name) {
            return Ok(Some(cf));
        }
        if !create {
            return Ok(None);
        }
        if let Err(e) = db.create_cf(&name, &Options::default()) {
            // Lost a creation race with another caller.
            if db.cf_handle(&name).is_none() {
                return Err(db_err(e));
            }
        }
        Self::cf(db, &name).map(Some)
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode_id(key: &[u8]) -> Result<DocumentId> {
        keys::document_id_from_key(key).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RocksStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| StoreError::Connection(format!("{}: {e}", self.root.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Connection(e.to_string()))?;
            if entry.path().join("CURRENT").is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn apply_schema(&self, database: &str, schema: &DatabaseSchema) -> Result<()> {
        let db = self.open_database(database)?;
        let meta = Self::cf(&db, SCHEMA_CF)?;

        let mut batch = WriteBatch::default();
        for spec in &schema.collections {
            Self::collection(&db, &spec.name, true)?;
            batch.put_cf(&meta, keys::schema_key(&spec.name), Self::serialize(spec)?);
        }
        db.write(batch).map_err(db_err)?;

        debug!(
            database,
            collections = schema.collections.len(),
            "Applied schema"
        );
        Ok(())
    }

    async fn insert_many(&self, ns: &Namespace, documents: &[Document]) -> Result<()> {
        let db = self.open_database(&ns.database)?;
        let cf = Self::collection(&db, &ns.collection, true)?
            .ok_or_else(|| StoreError::Database(format!("collection not created: {ns}")))?;

        let mut batch = WriteBatch::default();
        let mut seen = HashSet::with_capacity(documents.len());
        let mut first_duplicate = None;
        for (index, doc) in documents.iter().enumerate() {
            let key = keys::document_key(&doc.id);
            let exists = !seen.insert(doc.id)
                || db.get_pinned_cf(&cf, key).map_err(db_err)?.is_some();
            if exists {
                first_duplicate.get_or_insert((index, doc.id));
                continue;
            }
            batch.put_cf(&cf, key, Self::serialize(&doc.fields)?);
        }
        db.write(batch).map_err(db_err)?;

        match first_duplicate {
            Some((index, id)) => Err(StoreError::BulkWrite {
                index,
                message: format!("duplicate key: {id}"),
            }),
            None => Ok(()),
        }
    }

    async fn find_ids(
        &self,
        ns: &Namespace,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(Vec::new());
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        for item in db.iterator_cf(&cf, IteratorMode::Start) {
            if ids.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(db_err)?;
            let matched = match filter {
                Filter::All => true,
                _ => filter.matches(&Self::deserialize::<Fields>(&value)?),
            };
            if matched {
                ids.push(Self::decode_id(&key)?);
            }
        }
        Ok(ids)
    }

    async fn find_page(
        &self,
        ns: &Namespace,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(Vec::new());
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(Vec::new());
        };

        let start = after.map(|id| keys::document_key(&id));
        let mode = match &start {
            Some(key) => IteratorMode::From(key, Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut page = Vec::new();
        for item in db.iterator_cf(&cf, mode) {
            let (key, value) = item.map_err(db_err)?;
            if start.as_ref().is_some_and(|s| key.as_ref() == s.as_slice()) {
                continue;
            }
            if page.len() >= limit {
                break;
            }
            page.push(Document::new(
                Self::decode_id(&key)?,
                Self::deserialize(&value)?,
            ));
        }
        Ok(page)
    }

    async fn last_id(&self, ns: &Namespace) -> Result<Option<DocumentId>> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(None);
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(None);
        };

        match db.iterator_cf(&cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item.map_err(db_err)?;
                Ok(Some(Self::decode_id(&key)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_many(&self, ns: &Namespace, ids: &[DocumentId]) -> Result<u64> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(0);
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(0);
        };

        let mut batch = WriteBatch::default();
        let mut seen = HashSet::with_capacity(ids.len());
        let mut deleted = 0u64;
        for id in ids {
            let key = keys::document_key(id);
            if seen.insert(*id) && db.get_pinned_cf(&cf, key).map_err(db_err)?.is_some() {
                deleted += 1;
                batch.delete_cf(&cf, key);
            }
        }
        db.write(batch).map_err(db_err)?;
        Ok(deleted)
    }

    async fn update_many(&self, ns: &Namespace, updates: &[FieldUpdate]) -> Result<u64> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(0);
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(0);
        };

        // Several updates may target the same document within one batch.
        let mut pending: HashMap<DocumentId, Fields> = HashMap::new();
        let mut matched = 0u64;
        for update in updates {
            let fields = match pending.entry(update.id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    match db
                        .get_pinned_cf(&cf, keys::document_key(&update.id))
                        .map_err(db_err)?
                    {
                        Some(value) => entry.insert(Self::deserialize(&value)?),
                        None => continue,
                    }
                }
            };
            fields.insert(update.field.clone(), update.value.clone());
            matched += 1;
        }

        let mut batch = WriteBatch::default();
        for (id, fields) in &pending {
            batch.put_cf(&cf, keys::document_key(id), Self::serialize(fields)?);
        }
        db.write(batch).map_err(db_err)?;
        Ok(matched)
    }

    async fn count(&self, ns: &Namespace) -> Result<u64> {
        let Some(db) = self.existing_database(&ns.database)? else {
            return Ok(0);
        };
        let Some(cf) = Self::collection(&db, &ns.collection, false)? else {
            return Ok(0);
        };

        let mut count = 0u64;
        for item in db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(db_err)?;
            count += 1;
        }
        Ok(count)
    }
}
