//! Throttle-aware bulk insert, update, delete and copy.
//!
//! Every write goes through one retry loop: submit the batch, and on a throttling error
//! resubmit only the records the store reported as failed (or the whole batch when the store
//! rejected the request outright). Any other error aborts immediately. The shared
//! [`RateController`] is adjusted after every attempt and its delay is slept between logical
//! batches of the paginated operations.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use bulkload_core::{
    Document, DocumentId, DocumentIdAllocator, EngineConfig, FieldUpdate, Fields, Filter,
    Namespace,
};
use bulkload_store::{DocumentStore, StoreError};

use crate::error::{EngineError, Result};
use crate::rate::RateController;

/// Field carrying a source identifier in imported documents; never copied.
const SOURCE_ID_FIELD: &str = "_id";

/// How long to wait before retrying a throttled attempt.
#[derive(Debug, Clone, Copy)]
enum Backoff {
    /// `initial * 2^(attempt - 1)`.
    Exponential,
    /// Always `initial`.
    Fixed,
}

/// A record kind that can be submitted as one bulk request.
trait Mutation: Send + Sync + Sized {
    const OPERATION: &'static str;

    /// Submit `batch`, returning how many records the store applied.
    fn submit<'a, S: DocumentStore + ?Sized>(
        store: &'a S,
        ns: &'a Namespace,
        batch: &'a [Self],
    ) -> BoxFuture<'a, bulkload_store::Result<u64>>;
}

impl Mutation for Document {
    const OPERATION: &'static str = "insert";

    fn submit<'a, S: DocumentStore + ?Sized>(
        store: &'a S,
        ns: &'a Namespace,
        batch: &'a [Self],
    ) -> BoxFuture<'a, bulkload_store::Result<u64>> {
        async move {
            store.insert_many(ns, batch).await?;
            Ok(batch.len() as u64)
        }
        .boxed()
    }
}

impl Mutation for DocumentId {
    const OPERATION: &'static str = "delete";

    fn submit<'a, S: DocumentStore + ?Sized>(
        store: &'a S,
        ns: &'a Namespace,
        batch: &'a [Self],
    ) -> BoxFuture<'a, bulkload_store::Result<u64>> {
        store.delete_many(ns, batch)
    }
}

impl Mutation for FieldUpdate {
    const OPERATION: &'static str = "update";

    fn submit<'a, S: DocumentStore + ?Sized>(
        store: &'a S,
        ns: &'a Namespace,
        batch: &'a [Self],
    ) -> BoxFuture<'a, bulkload_store::Result<u64>> {
        store.update_many(ns, batch)
    }
}

/// Keep the records at the reported positions; an empty report keeps everything.
fn retain_failed<T>(pending: Vec<T>, failed: &[usize]) -> Result<Vec<T>> {
    if failed.is_empty() {
        return Ok(pending);
    }
    let batch_len = pending.len();
    if let Some(&index) = failed.iter().find(|&&i| i >= batch_len) {
        return Err(EngineError::InvalidFailureReport { index, batch_len });
    }
    let failed: BTreeSet<usize> = failed.iter().copied().collect();
    Ok(pending
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| failed.contains(&i).then_some(record))
        .collect())
}

/// Bulk mutation engine bound to one store.
///
/// Cancel an operation by dropping its future (for example with `tokio::time::timeout`).
/// Records in requests the store already acknowledged stay applied; nothing is rolled back.
pub struct BatchEngine<S: ?Sized> {
    store: Arc<S>,
    rate: Arc<RateController>,
    ids: Arc<DocumentIdAllocator>,
    config: EngineConfig,
}

impl<S: DocumentStore + ?Sized> BatchEngine<S> {
    /// Create an engine over `store`, pacing with the shared `rate` controller.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(store: Arc<S>, rate: Arc<RateController>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            rate,
            ids: Arc::new(DocumentIdAllocator::new()),
            config,
        })
    }

    /// Share an identifier allocator with other engines in the process.
    #[must_use]
    pub fn with_id_allocator(mut self, ids: Arc<DocumentIdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The shared rate controller.
    pub fn rate(&self) -> &Arc<RateController> {
        &self.rate
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Insert `records` as one logical batch and return their assigned identifiers in input
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RetriesExhausted`] if throttling persists past the attempt
    /// ceiling, or the store error for any non-throttling failure. Records acknowledged before
    /// the failure remain inserted.
    #[instrument(skip(self, records), fields(namespace = %ns, records = records.len()))]
    pub async fn insert_batch(
        &self,
        ns: &Namespace,
        records: Vec<Fields>,
    ) -> Result<Vec<DocumentId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.ids.next_ids(records.len())?;
        let documents = ids
            .iter()
            .zip(records)
            .map(|(id, fields)| Document::new(*id, fields))
            .collect();
        self.apply_with_retry(ns, documents, Backoff::Exponential).await?;
        Ok(ids)
    }

    /// Insert `records` in chunks of `insert_batch_size`, sleeping the adaptive delay between
    /// chunks.
    ///
    /// # Errors
    ///
    /// Stops at the first chunk that fails; earlier chunks stay inserted.
    #[instrument(skip(self, records), fields(namespace = %ns, records = records.len()))]
    pub async fn insert_chunked(
        &self,
        ns: &Namespace,
        records: Vec<Fields>,
    ) -> Result<Vec<DocumentId>> {
        let total = records.len();
        let mut ids = Vec::with_capacity(total);
        let mut remaining = records.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<Fields> = remaining
                .by_ref()
                .take(self.config.insert_batch_size)
                .collect();
            ids.extend(self.insert_batch(ns, chunk).await?);
            info!(inserted = ids.len(), total, "Inserted chunk");
            if remaining.peek().is_some() {
                self.pause().await;
            }
        }
        Ok(ids)
    }

    /// Apply field updates in requests of `update_batch_size`, returning how many matched.
    ///
    /// # Errors
    ///
    /// Same failure behaviour as [`insert_batch`](Self::insert_batch).
    #[instrument(skip(self, updates), fields(namespace = %ns, updates = updates.len()))]
    pub async fn update_batch(&self, ns: &Namespace, updates: Vec<FieldUpdate>) -> Result<u64> {
        let total = updates.len();
        let mut matched = 0;
        let mut remaining = updates.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<FieldUpdate> = remaining
                .by_ref()
                .take(self.config.update_batch_size)
                .collect();
            matched += self.apply_with_retry(ns, chunk, Backoff::Exponential).await?;
            debug!(matched, total, "Applied update request");
            if remaining.peek().is_some() {
                self.pause().await;
            }
        }
        Ok(matched)
    }

    /// Delete every document matching `filter`, `delete_batch_size` at a time, returning the
    /// number deleted.
    ///
    /// A throttled cycle is retried on its own after the fixed initial delay; completed cycles
    /// are never repeated.
    ///
    /// The total counts what the store reports for acknowledged requests. When a cycle is
    /// throttled, the ids the store did not report as failed are counted as deleted, so an id
    /// removed concurrently by another writer during that cycle is counted too.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RetriesExhausted`] when one cycle stays throttled past the
    /// attempt ceiling, [`EngineError::Stalled`] when matching documents stop disappearing, or
    /// the store error for any other failure.
    #[instrument(skip(self, filter), fields(namespace = %ns))]
    pub async fn delete_all(&self, ns: &Namespace, filter: &Filter) -> Result<u64> {
        let limit = self.config.delete_batch_size;
        let mut deleted = 0;
        let mut cycles = 0u32;
        let mut stalled = 0u32;
        loop {
            let ids = self
                .read_with_retry("find_ids", ns, || self.store.find_ids(ns, filter, limit))
                .await?;
            if ids.is_empty() {
                break;
            }
            let removed = self.apply_with_retry(ns, ids, Backoff::Fixed).await?;
            cycles += 1;
            if removed == 0 {
                stalled += 1;
                if stalled >= self.config.max_attempts {
                    return Err(EngineError::Stalled {
                        operation: "delete",
                        namespace: ns.to_string(),
                        cycles: stalled,
                    });
                }
            } else {
                stalled = 0;
            }
            deleted += removed;
            info!(removed, deleted, cycle = cycles, "Deleted batch");
            self.pause().await;
        }
        info!(deleted, cycles, "Deletion complete");
        Ok(deleted)
    }

    /// Copy every document from `source` into `destination` with fresh identifiers, returning
    /// the number copied.
    ///
    /// The copy covers the documents present when it starts: the last source identifier is
    /// read first and pages stop at it. Pages are read in identifier order after the last
    /// copied identifier, so no document up to that bound is skipped or copied twice, and
    /// documents inserted into `source` during the copy are left out.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CopyOntoItself`] when `source` and `destination` are the same
    /// collection. Otherwise stops at the first page that fails to read or write; earlier
    /// pages stay copied.
    #[instrument(skip(self), fields(source = %source, destination = %destination))]
    pub async fn copy_all(&self, source: &Namespace, destination: &Namespace) -> Result<u64> {
        if source == destination {
            return Err(EngineError::CopyOntoItself {
                namespace: source.to_string(),
            });
        }
        let Some(bound) = self
            .read_with_retry("last_id", source, || self.store.last_id(source))
            .await?
        else {
            info!("Source is empty");
            return Ok(0);
        };

        let page_size = self.config.copy_page_size;
        let mut after: Option<DocumentId> = None;
        let mut copied = 0u64;
        loop {
            let page = self
                .read_with_retry("find_page", source, || {
                    self.store.find_page(source, after, page_size)
                })
                .await?;
            let short = page.len() < page_size;
            let page: Vec<Document> = page
                .into_iter()
                .take_while(|doc| doc.id <= bound)
                .collect();
            let Some(last) = page.last().map(|doc| doc.id) else {
                break;
            };
            let len = page.len();
            let records = page
                .into_iter()
                .map(|doc| {
                    let mut fields = doc.fields;
                    fields.remove(SOURCE_ID_FIELD);
                    fields
                })
                .collect();
            self.insert_batch(destination, records).await?;
            copied += len as u64;
            after = Some(last);
            info!(copied, "Copied page");
            if short || last >= bound {
                break;
            }
            self.pause().await;
        }
        info!(copied, "Copy complete");
        Ok(copied)
    }

    /// Identifiers of every document in `ns`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the read stays throttled or fails.
    pub async fn list_ids(&self, ns: &Namespace) -> Result<Vec<DocumentId>> {
        self.read_with_retry("find_ids", ns, || {
            self.store.find_ids(ns, &Filter::All, usize::MAX)
        })
        .await
    }

    /// Number of documents in `ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read stays throttled or fails.
    pub async fn count(&self, ns: &Namespace) -> Result<u64> {
        self.read_with_retry("count", ns, || self.store.count(ns)).await
    }

    /// Sleep the current adaptive delay.
    pub(crate) async fn pause(&self) {
        tokio::time::sleep(self.rate.current_delay()).await;
    }

    fn backoff(&self, backoff: Backoff, attempt: u32) -> Duration {
        match backoff {
            Backoff::Exponential => self.rate.delay_for(attempt),
            Backoff::Fixed => self.config.initial_retry_delay(),
        }
    }

    /// Submit `pending` until the store accepts all of it, resubmitting only failed records.
    async fn apply_with_retry<M: Mutation>(
        &self,
        ns: &Namespace,
        mut pending: Vec<M>,
        backoff: Backoff,
    ) -> Result<u64> {
        if pending.is_empty() {
            return Ok(0);
        }
        let mut applied = 0;
        let mut attempt = 1;
        loop {
            match M::submit(self.store.as_ref(), ns, &pending).await {
                Ok(count) => {
                    self.rate.record_success();
                    return Ok(applied + count);
                }
                Err(StoreError::Throttled { failed_indices }) => {
                    self.rate.record_throttle();
                    let submitted = pending.len();
                    pending = retain_failed(pending, &failed_indices)?;
                    applied += (submitted - pending.len()) as u64;

                    if attempt >= self.config.max_attempts {
                        warn!(
                            operation = M::OPERATION,
                            attempts = attempt,
                            outstanding = pending.len(),
                            "Giving up on throttled batch"
                        );
                        return Err(EngineError::RetriesExhausted {
                            operation: M::OPERATION,
                            namespace: ns.to_string(),
                            attempts: attempt,
                            outstanding: pending.len(),
                        });
                    }

                    let delay = self.backoff(backoff, attempt);
                    warn!(
                        operation = M::OPERATION,
                        attempt,
                        retrying = pending.len(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Throttled, retrying failed records"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run a read, retrying whole-request throttling after the fixed initial delay.
    async fn read_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        ns: &Namespace,
        mut read: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bulkload_store::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match read().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_throttled() => {
                    self.rate.record_throttle();
                    if attempt >= self.config.max_attempts {
                        return Err(EngineError::RetriesExhausted {
                            operation,
                            namespace: ns.to_string(),
                            attempts: attempt,
                            outstanding: 0,
                        });
                    }
                    warn!(operation, attempt, "Read throttled, retrying");
                    tokio::time::sleep(self.config.initial_retry_delay()).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
