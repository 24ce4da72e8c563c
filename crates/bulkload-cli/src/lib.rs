//! Command-line loader for bulkload.
//!
//! This crate provides the `bulkload` binary and the pieces it is built from:
//!
//! - `provision <tenant>`: create a tenant database with its schema if missing
//! - `seed [tenant]`: clear, regenerate and link users and schools
//! - `copy [tenant]`: copy users and schools into fresh collections and relink them
//! - `seed-sports`: clear and regenerate seasons, athletes, races and results
//!
//! # Configuration
//!
//! Settings come from the JSON file named by `--config` or `BULKLOAD_CONFIG` (optional),
//! overridden by `BULKLOAD_*` environment variables. See [`LoaderConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod command;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod jobs;

pub use command::{Cli, Command};
pub use config::LoaderConfig;
pub use error::{CliError, Result};
pub use jobs::{CopyReport, Loader, SeedReport, SportsReport};
