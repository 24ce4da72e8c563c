//! Collection copy with fresh identifiers.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;

use bulkload_core::EngineConfig;
use bulkload_engine::EngineError;
use bulkload_store::{Fault, Operation};
use common::{ns, record, records, stored_seqs, TestHarness};

#[tokio::test(start_paused = true)]
async fn copies_all_documents_in_order_with_new_ids() {
    let harness = TestHarness::new();
    let source = ns("users");
    let destination = ns("users_new");
    harness
        .engine
        .insert_chunked(&source, records(250))
        .await
        .unwrap();

    let copied = harness
        .engine
        .copy_all(&source, &destination)
        .await
        .unwrap();

    assert_eq!(copied, 250);
    assert_eq!(
        stored_seqs(&harness.store, &destination).await,
        (0..250).collect::<Vec<_>>()
    );
    // 100 + 100 + 50; a short page ends the copy.
    assert_eq!(harness.store.stats().calls(Operation::FindPage), 3);

    let source_ids: HashSet<_> = harness
        .store
        .documents(&source)
        .await
        .iter()
        .map(|doc| doc.id)
        .collect();
    let copies = harness.store.documents(&destination).await;
    assert!(copies.iter().all(|doc| !source_ids.contains(&doc.id)));
}

#[tokio::test(start_paused = true)]
async fn exact_multiple_of_page_size_stops_at_last_document() {
    let harness = TestHarness::new();
    let source = ns("schools");
    harness
        .engine
        .insert_batch(&source, records(200))
        .await
        .unwrap();

    let copied = harness
        .engine
        .copy_all(&source, &ns("schools_new"))
        .await
        .unwrap();

    assert_eq!(copied, 200);
    assert_eq!(harness.store.stats().calls(Operation::FindPage), 2);
}

#[tokio::test(start_paused = true)]
async fn source_identifier_field_is_stripped() {
    let harness = TestHarness::new();
    let source = ns("users");
    let destination = ns("users_new");
    harness
        .engine
        .insert_batch(
            &source,
            vec![record(json!({ "_id": "legacy-1", "seq": 0, "name": "Ada" }))],
        )
        .await
        .unwrap();

    harness
        .engine
        .copy_all(&source, &destination)
        .await
        .unwrap();

    let copies = harness.store.documents(&destination).await;
    assert_eq!(copies.len(), 1);
    assert!(copies[0].field("_id").is_none());
    assert_eq!(copies[0].field("name"), Some(&json!("Ada")));
}

#[tokio::test(start_paused = true)]
async fn throttled_reads_and_writes_do_not_skip_or_duplicate() {
    let harness = TestHarness::with_config(EngineConfig {
        copy_page_size: 40,
        ..EngineConfig::default()
    });
    let source = ns("users");
    let destination = ns("users_new");
    harness
        .engine
        .insert_batch(&source, records(100))
        .await
        .unwrap();
    harness
        .store
        .inject(Operation::FindPage, Fault::ThrottleRequest);
    // Injected after seeding, so it hits the first copied page.
    harness.store.inject(
        Operation::Insert,
        Fault::Throttle {
            indices: vec![3, 39],
        },
    );

    let copied = harness
        .engine
        .copy_all(&source, &destination)
        .await
        .unwrap();

    assert_eq!(copied, 100);
    let mut seqs = stored_seqs(&harness.store, &destination).await;
    seqs.sort_unstable();
    assert_eq!(seqs, (0..100).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn empty_source_copies_nothing() {
    let harness = TestHarness::new();

    let copied = harness
        .engine
        .copy_all(&ns("users"), &ns("users_new"))
        .await
        .unwrap();

    assert_eq!(copied, 0);
    assert_eq!(harness.store.stats().calls(Operation::Insert), 0);
}

#[tokio::test(start_paused = true)]
async fn copy_onto_itself_is_rejected() {
    let harness = TestHarness::new();
    let users = ns("users");
    harness
        .engine
        .insert_batch(&users, records(100))
        .await
        .unwrap();

    let err = harness.engine.copy_all(&users, &users).await.unwrap_err();

    assert!(matches!(err, EngineError::CopyOntoItself { .. }));
    assert_eq!(harness.store.documents(&users).await.len(), 100);
    assert_eq!(harness.store.stats().calls(Operation::FindPage), 0);
}

#[tokio::test(start_paused = true)]
async fn inserts_during_copy_are_left_out() {
    let harness = TestHarness::with_config(EngineConfig {
        copy_page_size: 10,
        ..EngineConfig::default()
    });
    let source = ns("users");
    let destination = ns("users_new");
    harness
        .engine
        .insert_batch(&source, records(100))
        .await
        .unwrap();

    let writer = async {
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            harness
                .engine
                .insert_batch(&source, records(10))
                .await
                .unwrap();
        }
    };
    let (copied, ()) = tokio::join!(harness.engine.copy_all(&source, &destination), writer);

    assert_eq!(copied.unwrap(), 100);
    assert_eq!(
        stored_seqs(&harness.store, &destination).await,
        (0..100).collect::<Vec<_>>()
    );
    assert_eq!(harness.store.documents(&source).await.len(), 300);
}
