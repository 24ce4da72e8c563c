//! In-memory document store with scripted fault injection.
//!
//! Faults are queued per [`Operation`] and consumed one per call, so a test can describe an
//! exact throttling sequence ("reject indices 10, 57 and 133 on the first insert only") and then
//! assert on the resulting [`StoreStats`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::RwLock;

use bulkload_core::{
    CollectionSpec, DatabaseSchema, Document, DocumentId, FieldUpdate, Fields, Filter, Namespace,
};

use crate::error::{Result, StoreError};
use crate::DocumentStore;

/// A store operation that faults can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_databases`
    ListDatabases,
    /// `apply_schema`
    ApplySchema,
    /// `insert_many`
    Insert,
    /// `find_ids`
    FindIds,
    /// `find_page`
    FindPage,
    /// `last_id`
    LastId,
    /// `delete_many`
    Delete,
    /// `update_many`
    Update,
    /// `count`
    Count,
}

/// A failure injected into the next call of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Reject the records at these positions as throttled; apply the rest.
    Throttle {
        /// Positions within the submitted slice.
        indices: Vec<usize>,
    },
    /// Reject the whole request as throttled; apply nothing.
    ThrottleRequest,
    /// Reject one record with a non-retryable error; apply the rest.
    Reject {
        /// Position within the submitted slice.
        index: usize,
        /// Failure description.
        message: String,
    },
    /// Fail the call outright with a database error.
    Fatal(String),
}

/// Call counters recorded by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Calls per operation.
    pub calls: HashMap<Operation, usize>,
    /// Number of documents submitted by each `insert_many` call, in call order.
    pub insert_batches: Vec<usize>,
    /// Number of ids submitted by each `delete_many` call, in call order.
    pub delete_batches: Vec<usize>,
    /// Number of updates submitted by each `update_many` call, in call order.
    pub update_batches: Vec<usize>,
}

impl StoreStats {
    /// How many times `op` was called.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.get(&op).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Database {
    collections: HashMap<String, BTreeMap<DocumentId, Fields>>,
    schema: Vec<CollectionSpec>,
}

/// In-process `DocumentStore` implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: RwLock<BTreeMap<String, Database>>,
    faults: Mutex<HashMap<Operation, VecDeque<Fault>>>,
    stats: Mutex<StoreStats>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next call of `op`.
    pub fn inject(&self, op: Operation, fault: Fault) {
        lock(&self.faults).entry(op).or_default().push_back(fault);
    }

    /// Queue the same fault for the next `times` calls of `op`.
    pub fn inject_repeated(&self, op: Operation, fault: &Fault, times: usize) {
        let mut faults = lock(&self.faults);
        let queue = faults.entry(op).or_default();
        queue.extend(std::iter::repeat(fault.clone()).take(times));
    }

    /// Snapshot of the call counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        lock(&self.stats).clone()
    }

    /// Collections and indexes most recently applied to `database`.
    pub async fn schema(&self, database: &str) -> Option<Vec<CollectionSpec>> {
        self.databases
            .read()
            .await
            .get(database)
            .map(|db| db.schema.clone())
    }

    /// All documents in a collection, in ascending id order.
    pub async fn documents(&self, ns: &Namespace) -> Vec<Document> {
        self.databases
            .read()
            .await
            .get(&ns.database)
            .and_then(|db| db.collections.get(&ns.collection))
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Record the call and take the next queued fault for `op`.
    fn begin(&self, op: Operation, batch_len: Option<usize>) -> Option<Fault> {
        {
            let mut stats = lock(&self.stats);
            *stats.calls.entry(op).or_insert(0) += 1;
            if let Some(len) = batch_len {
                match op {
                    Operation::Insert => stats.insert_batches.push(len),
                    Operation::Delete => stats.delete_batches.push(len),
                    Operation::Update => stats.update_batches.push(len),
                    _ => {}
                }
            }
        }
        lock(&self.faults).get_mut(&op).and_then(VecDeque::pop_front)
    }
}

/// How a queued fault shapes a bulk call over `len` records.
struct BulkOutcome {
    throttled: Vec<usize>,
    rejected: Option<(usize, String)>,
}

impl BulkOutcome {
    /// Resolve the fault, returning early for faults that reject the whole call.
    fn resolve(fault: Option<Fault>, len: usize) -> Result<Self> {
        let mut outcome = Self {
            throttled: Vec::new(),
            rejected: None,
        };
        match fault {
            None => {}
            Some(Fault::Fatal(message)) => return Err(StoreError::Database(message)),
            Some(Fault::ThrottleRequest) => return Err(StoreError::throttled_request()),
            Some(Fault::Throttle { mut indices }) => {
                indices.retain(|&i| i < len);
                indices.sort_unstable();
                indices.dedup();
                outcome.throttled = indices;
            }
            Some(Fault::Reject { index, message }) => outcome.rejected = Some((index, message)),
        }
        Ok(outcome)
    }

    fn skips(&self, index: usize) -> bool {
        self.throttled.binary_search(&index).is_ok()
            || self.rejected.as_ref().is_some_and(|(i, _)| *i == index)
    }

    /// Turn the recorded failures into the call's result.
    fn finish<T>(self, value: T, first_duplicate: Option<(usize, DocumentId)>) -> Result<T> {
        if let Some((index, message)) = self.rejected {
            return Err(StoreError::BulkWrite { index, message });
        }
        if let Some((index, id)) = first_duplicate {
            return Err(StoreError::BulkWrite {
                index,
                message: format!("duplicate key: {id}"),
            });
        }
        if !self.throttled.is_empty() {
            return Err(StoreError::Throttled {
                failed_indices: self.throttled,
            });
        }
        Ok(value)
    }
}

/// Reads only ever fail as a whole.
fn read_fault(fault: Option<Fault>) -> Result<()> {
    match fault {
        None => Ok(()),
        Some(Fault::Throttle { .. } | Fault::ThrottleRequest) => {
            Err(StoreError::throttled_request())
        }
        Some(Fault::Reject { message, .. } | Fault::Fatal(message)) => {
            Err(StoreError::Database(message))
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        read_fault(self.begin(Operation::ListDatabases, None))?;
        Ok(self.databases.read().await.keys().cloned().collect())
    }

    async fn apply_schema(&self, database: &str, schema: &DatabaseSchema) -> Result<()> {
        read_fault(self.begin(Operation::ApplySchema, None))?;

        let mut databases = self.databases.write().await;
        let db = databases.entry(database.to_string()).or_default();
        for spec in &schema.collections {
            db.collections.entry(spec.name.clone()).or_default();
            match db.schema.iter_mut().find(|s| s.name == spec.name) {
                Some(existing) => *existing = spec.clone(),
                None => db.schema.push(spec.clone()),
            }
        }
        Ok(())
    }

    async fn insert_many(&self, ns: &Namespace, documents: &[Document]) -> Result<()> {
        let outcome = BulkOutcome::resolve(
            self.begin(Operation::Insert, Some(documents.len())),
            documents.len(),
        )?;

        let mut databases = self.databases.write().await;
        let collection = databases
            .entry(ns.database.clone())
            .or_default()
            .collections
            .entry(ns.collection.clone())
            .or_default();

        let mut first_duplicate = None;
        for (index, doc) in documents.iter().enumerate() {
            if outcome.skips(index) {
                continue;
            }
            if collection.contains_key(&doc.id) {
                first_duplicate.get_or_insert((index, doc.id));
                continue;
            }
            collection.insert(doc.id, doc.fields.clone());
        }

        outcome.finish((), first_duplicate)
    }

    async fn find_ids(
        &self,
        ns: &Namespace,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        read_fault(self.begin(Operation::FindIds, None))?;

        let databases = self.databases.read().await;
        Ok(databases
            .get(&ns.database)
            .and_then(|db| db.collections.get(&ns.collection))
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.matches(fields))
                    .map(|(id, _)| *id)
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_page(
        &self,
        ns: &Namespace,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        read_fault(self.begin(Operation::FindPage, None))?;

        let databases = self.databases.read().await;
        let Some(docs) = databases
            .get(&ns.database)
            .and_then(|db| db.collections.get(&ns.collection))
        else {
            return Ok(Vec::new());
        };

        let page = match after {
            Some(after) => docs
                .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                .take(limit)
                .map(|(id, fields)| Document::new(*id, fields.clone()))
                .collect(),
            None => docs
                .iter()
                .take(limit)
                .map(|(id, fields)| Document::new(*id, fields.clone()))
                .collect(),
        };
        Ok(page)
    }

    async fn last_id(&self, ns: &Namespace) -> Result<Option<DocumentId>> {
        read_fault(self.begin(Operation::LastId, None))?;

        let databases = self.databases.read().await;
        Ok(databases
            .get(&ns.database)
            .and_then(|db| db.collections.get(&ns.collection))
            .and_then(|docs| docs.keys().next_back().copied()))
    }

    async fn delete_many(&self, ns: &Namespace, ids: &[DocumentId]) -> Result<u64> {
        let outcome =
            BulkOutcome::resolve(self.begin(Operation::Delete, Some(ids.len())), ids.len())?;

        let mut databases = self.databases.write().await;
        let mut deleted = 0u64;
        if let Some(collection) = databases
            .get_mut(&ns.database)
            .and_then(|db| db.collections.get_mut(&ns.collection))
        {
            for (index, id) in ids.iter().enumerate() {
                if !outcome.skips(index) && collection.remove(id).is_some() {
                    deleted += 1;
                }
            }
        }

        outcome.finish(deleted, None)
    }

    async fn update_many(&self, ns: &Namespace, updates: &[FieldUpdate]) -> Result<u64> {
        let outcome = BulkOutcome::resolve(
            self.begin(Operation::Update, Some(updates.len())),
            updates.len(),
        )?;

        let mut databases = self.databases.write().await;
        let mut matched = 0u64;
        if let Some(collection) = databases
            .get_mut(&ns.database)
            .and_then(|db| db.collections.get_mut(&ns.collection))
        {
            for (index, update) in updates.iter().enumerate() {
                if outcome.skips(index) {
                    continue;
                }
                if let Some(fields) = collection.get_mut(&update.id) {
                    fields.insert(update.field.clone(), update.value.clone());
                    matched += 1;
                }
            }
        }

        outcome.finish(matched, None)
    }

    async fn count(&self, ns: &Namespace) -> Result<u64> {
        read_fault(self.begin(Operation::Count, None))?;

        let databases = self.databases.read().await;
        Ok(databases
            .get(&ns.database)
            .and_then(|db| db.collections.get(&ns.collection))
            .map_or(0, |docs| docs.len() as u64))
    }
}
