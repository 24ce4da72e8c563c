//! Adaptive, rate-limited bulk mutation engine.
//!
//! - [`RateController`]: the process-wide adaptive delay
//! - [`TenantProvisioner`]: exactly-once tenant database creation
//! - [`BatchEngine`]: throttle-aware insert, update, delete and copy
//! - [`assign_windows`] and [`BatchEngine::link`]: windowed relationship linking
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bulkload_core::{EngineConfig, Namespace};
//! use bulkload_engine::{BatchEngine, RateController};
//! use bulkload_store::MemoryStore;
//!
//! # async fn example() -> bulkload_engine::Result<()> {
//! let config = EngineConfig::default();
//! let rate = Arc::new(RateController::new(&config));
//! let engine = BatchEngine::new(Arc::new(MemoryStore::new()), rate, config)?;
//!
//! let users = Namespace::new("Keo_acme", "users");
//! let mut record = serde_json::Map::new();
//! record.insert("name".into(), "Ada".into());
//! let ids = engine.insert_batch(&users, vec![record]).await?;
//! assert_eq!(ids.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod link;
pub mod provision;
pub mod rate;

pub use batch::BatchEngine;
pub use error::{EngineError, Result};
pub use link::{assign_windows, LinkReport};
pub use provision::{Provisioned, TenantProvisioner};
pub use rate::RateController;
