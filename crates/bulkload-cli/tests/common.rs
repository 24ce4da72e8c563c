//! Common test utilities for loader integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use tempfile::TempDir;

use bulkload_cli::{Loader, LoaderConfig};
use bulkload_store::{MemoryStore, RocksStore};

/// A small fixture set that still spans several insert chunks.
pub fn small_config() -> LoaderConfig {
    let mut config = LoaderConfig {
        users: 30,
        schools_per_user: 4,
        copy_link_window: 4,
        seasons: 2,
        athletes: 40,
        races_per_season: 5,
        athletes_per_race: 8,
        ..LoaderConfig::default()
    };
    config.engine.insert_batch_size = 25;
    config.engine.delete_batch_size = 40;
    config.engine.copy_page_size = 16;
    config
}

/// Loader over an in-memory store.
pub fn memory_loader() -> (Arc<MemoryStore>, Loader<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let loader = Loader::new(Arc::clone(&store), small_config()).expect("valid config");
    (store, loader)
}

/// Loader over a `RocksDB` store in a temporary directory.
pub struct RocksHarness {
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    pub store: Arc<RocksStore>,
    pub loader: Loader<RocksStore>,
}

impl RocksHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));
        let loader = Loader::new(Arc::clone(&store), small_config()).expect("valid config");
        Self {
            _temp_dir: temp_dir,
            store,
            loader,
        }
    }
}
