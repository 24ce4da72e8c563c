//! Tenant provisioning.

use std::sync::Arc;

use futures::future::join_all;

use bulkload_core::{CollectionSpec, DatabaseSchema};
use bulkload_engine::{EngineError, TenantProvisioner};
use bulkload_store::{DocumentStore, MemoryStore, Operation};

#[tokio::test]
async fn second_call_reports_existing_database() {
    let store = Arc::new(MemoryStore::new());
    let provisioner = TenantProvisioner::new(Arc::clone(&store), "Keo_");

    assert!(provisioner.ensure_tenant("acme").await.unwrap().created);
    assert!(!provisioner.ensure_tenant("acme").await.unwrap().created);

    assert_eq!(store.stats().calls(Operation::ApplySchema), 1);
    assert_eq!(store.list_databases().await.unwrap(), vec!["Keo_acme"]);
}

#[tokio::test]
async fn concurrent_callers_create_once() {
    let store = Arc::new(MemoryStore::new());
    let provisioner = Arc::new(TenantProvisioner::new(Arc::clone(&store), "Keo_"));

    let results = join_all((0..16).map(|_| {
        let provisioner = Arc::clone(&provisioner);
        async move { provisioner.ensure_tenant("acme").await }
    }))
    .await;

    let created = results
        .into_iter()
        .map(Result::unwrap)
        .filter(|outcome| outcome.created)
        .count();
    assert_eq!(created, 1);
    assert_eq!(store.stats().calls(Operation::ApplySchema), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_create_once() {
    let store = Arc::new(MemoryStore::new());
    let provisioner = Arc::new(TenantProvisioner::new(Arc::clone(&store), "Keo_"));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let provisioner = Arc::clone(&provisioner);
            let tenant = if i % 2 == 0 { "acme" } else { "globex" };
            tokio::spawn(async move { provisioner.ensure_tenant(tenant).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().created {
            created += 1;
        }
    }
    assert_eq!(created, 2);
    assert_eq!(store.stats().calls(Operation::ApplySchema), 2);
}

#[tokio::test]
async fn custom_schema_is_applied() {
    let store = Arc::new(MemoryStore::new());
    let schema = DatabaseSchema::new()
        .with_collection(CollectionSpec::new("users").with_index("email"))
        .with_collection(CollectionSpec::new("schools"));
    let provisioner =
        TenantProvisioner::new(Arc::clone(&store), "Keo_").with_schema(schema.clone());

    let outcome = provisioner.ensure_tenant("initech").await.unwrap();

    assert_eq!(outcome.database, "Keo_initech");
    assert_eq!(store.schema("Keo_initech").await.unwrap(), schema.collections);
}

#[tokio::test]
async fn invalid_tenant_name_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let provisioner = TenantProvisioner::new(Arc::clone(&store), "Keo_");

    let err = provisioner.ensure_tenant("../etc").await.unwrap_err();

    assert!(matches!(err, EngineError::Core(_)));
    assert!(store.list_databases().await.unwrap().is_empty());
}
