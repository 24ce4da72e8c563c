//! Idempotent tenant database provisioning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, instrument};

use bulkload_core::{DatabaseSchema, TenantName};
use bulkload_store::DocumentStore;

use crate::error::Result;

/// Outcome of [`TenantProvisioner::ensure_tenant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Physical database backing the tenant.
    pub database: String,
    /// `true` when this call created the database; `false` when it already existed.
    pub created: bool,
}

/// Creates tenant databases with their collections and indexes exactly once.
///
/// Calls for the same tenant are serialized within the process, so concurrent callers observe
/// one `created: true` and the schema is applied a single time. Coordination across processes
/// is not provided.
pub struct TenantProvisioner<S: ?Sized> {
    store: Arc<S>,
    prefix: String,
    schema: DatabaseSchema,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: DocumentStore + ?Sized> TenantProvisioner<S> {
    /// Create a provisioner that maps tenant `name` to database `{prefix}{name}` and applies
    /// the default tenant schema.
    pub fn new(store: Arc<S>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            schema: DatabaseSchema::tenant_default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the schema applied to new tenants.
    #[must_use]
    pub fn with_schema(mut self, schema: DatabaseSchema) -> Self {
        self.schema = schema;
        self
    }

    /// The physical database name for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid tenant name.
    pub fn database_for(&self, name: &str) -> Result<String> {
        Ok(TenantName::parse(name)?.database_name(&self.prefix))
    }

    /// Make sure the tenant's database exists with its schema applied.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid tenant name or when the store cannot list databases or
    /// apply the schema. Store errors are not retried.
    #[instrument(skip(self))]
    pub async fn ensure_tenant(&self, name: &str) -> Result<Provisioned> {
        let database = self.database_for(name)?;
        let lock = self.lock_for(&database);
        let _guard = lock.lock().await;

        let existing = self.store.list_databases().await?;
        if existing.iter().any(|db| db == &database) {
            info!(database = %database, "Tenant database already exists");
            return Ok(Provisioned {
                database,
                created: false,
            });
        }

        self.store.apply_schema(&database, &self.schema).await?;
        info!(
            database = %database,
            collections = self.schema.collections.len(),
            "Created tenant database"
        );
        Ok(Provisioned {
            database,
            created: true,
        })
    }

    fn lock_for(&self, database: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries held only by the map are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(database.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkload_store::{Fault, MemoryStore, Operation};

    #[tokio::test]
    async fn creates_then_reports_existing() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = TenantProvisioner::new(Arc::clone(&store), "Keo_");

        let first = provisioner.ensure_tenant("acme").await.unwrap();
        assert_eq!(first.database, "Keo_acme");
        assert!(first.created);

        let second = provisioner.ensure_tenant("acme").await.unwrap();
        assert!(!second.created);

        assert_eq!(store.stats().calls(Operation::ApplySchema), 1);
        let schema = store.schema("Keo_acme").await.unwrap();
        assert_eq!(schema[0].name, "schools");
    }

    #[tokio::test]
    async fn rejects_invalid_names_without_touching_store() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = TenantProvisioner::new(Arc::clone(&store), "Keo_");

        assert!(provisioner.ensure_tenant("").await.is_err());
        assert!(provisioner.ensure_tenant("a/b").await.is_err());
        assert_eq!(store.stats().calls(Operation::ListDatabases), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.inject(Operation::ListDatabases, Fault::Fatal("unreachable".into()));
        let provisioner = TenantProvisioner::new(Arc::clone(&store), "Keo_");

        assert!(provisioner.ensure_tenant("acme").await.is_err());
        assert_eq!(store.stats().calls(Operation::ApplySchema), 0);

        // A later call succeeds once the store recovers.
        assert!(provisioner.ensure_tenant("acme").await.unwrap().created);
    }
}
