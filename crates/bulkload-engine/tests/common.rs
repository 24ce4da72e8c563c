//! Common test utilities for engine integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use bulkload_core::{
    DatabaseSchema, Document, DocumentId, EngineConfig, FieldUpdate, Fields, Filter, Namespace,
};
use bulkload_engine::{BatchEngine, RateController};
use bulkload_store::{DocumentStore, MemoryStore, Result, StoreError};

/// Engine, store and controller wired together over an in-memory store.
pub struct TestHarness {
    /// The backing store, for fault injection and inspection.
    pub store: Arc<MemoryStore>,
    /// The shared rate controller.
    pub rate: Arc<RateController>,
    /// The engine under test.
    pub engine: BatchEngine<MemoryStore>,
}

impl TestHarness {
    /// Harness with default engine settings.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Harness with custom engine settings.
    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let rate = Arc::new(RateController::new(&config));
        let engine = BatchEngine::new(Arc::clone(&store), Arc::clone(&rate), config)
            .expect("valid engine config");
        Self {
            store,
            rate,
            engine,
        }
    }
}

/// Namespace in the test tenant database.
pub fn ns(collection: &str) -> Namespace {
    Namespace::new("Keo_test", collection)
}

/// `count` records with a unique `seq` field.
pub fn records(count: usize) -> Vec<Fields> {
    (0..count)
        .map(|seq| record(json!({ "seq": seq, "name": format!("record-{seq}") })))
        .collect()
}

/// Convert a JSON object literal into fields.
pub fn record(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(fields) => fields,
        other => panic!("expected an object, got {other}"),
    }
}

/// The `seq` values of the documents in a collection, in stored order.
pub async fn stored_seqs(store: &MemoryStore, ns: &Namespace) -> Vec<u64> {
    store
        .documents(ns)
        .await
        .iter()
        .map(|doc| doc.field("seq").and_then(serde_json::Value::as_u64).expect("seq field"))
        .collect()
}

/// How [`MisbehavingStore`] departs from a well-behaved store.
#[derive(Debug, Clone, Copy)]
pub enum Misbehavior {
    /// Report a throttled position just past the end of every insert batch.
    OutOfRangeFailure,
    /// Accept deletes without removing anything.
    IgnoreDeletes,
    /// On the first delete, another writer removes the first id, then the request is
    /// throttled with only its last id reported as failed.
    ConcurrentRemoval,
}

/// A store that breaks the contract in one specific way.
pub struct MisbehavingStore {
    pub inner: MemoryStore,
    pub mode: Misbehavior,
    first_delete: AtomicBool,
}

impl MisbehavingStore {
    pub fn new(mode: Misbehavior) -> Self {
        Self {
            inner: MemoryStore::new(),
            mode,
            first_delete: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl DocumentStore for MisbehavingStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.inner.list_databases().await
    }

    async fn apply_schema(&self, database: &str, schema: &DatabaseSchema) -> Result<()> {
        self.inner.apply_schema(database, schema).await
    }

    async fn insert_many(&self, ns: &Namespace, documents: &[Document]) -> Result<()> {
        match self.mode {
            Misbehavior::OutOfRangeFailure => Err(StoreError::Throttled {
                failed_indices: vec![documents.len()],
            }),
            Misbehavior::IgnoreDeletes | Misbehavior::ConcurrentRemoval => {
                self.inner.insert_many(ns, documents).await
            }
        }
    }

    async fn find_ids(
        &self,
        ns: &Namespace,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        self.inner.find_ids(ns, filter, limit).await
    }

    async fn find_page(
        &self,
        ns: &Namespace,
        after: Option<DocumentId>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        self.inner.find_page(ns, after, limit).await
    }

    async fn last_id(&self, ns: &Namespace) -> Result<Option<DocumentId>> {
        self.inner.last_id(ns).await
    }

    async fn delete_many(&self, ns: &Namespace, ids: &[DocumentId]) -> Result<u64> {
        match self.mode {
            Misbehavior::IgnoreDeletes => Ok(0),
            Misbehavior::ConcurrentRemoval
                if ids.len() > 2 && self.first_delete.swap(false, Ordering::SeqCst) =>
            {
                let last = ids.len() - 1;
                self.inner.delete_many(ns, &ids[..1]).await?;
                self.inner.delete_many(ns, &ids[1..last]).await?;
                Err(StoreError::Throttled {
                    failed_indices: vec![last],
                })
            }
            Misbehavior::OutOfRangeFailure | Misbehavior::ConcurrentRemoval => {
                self.inner.delete_many(ns, ids).await
            }
        }
    }

    async fn update_many(&self, ns: &Namespace, updates: &[FieldUpdate]) -> Result<u64> {
        self.inner.update_many(ns, updates).await
    }

    async fn count(&self, ns: &Namespace) -> Result<u64> {
        self.inner.count(ns).await
    }
}
