//! Bulkload - rate-limited bulk loader for tenant document stores.
//!
//! This is the main entry point for the `bulkload` binary.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bulkload_cli::{Cli, Command, Loader, LoaderConfig};
use bulkload_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bulkload=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = LoaderConfig::load(cli.config.as_deref())?;

    tracing::info!(
        data_dir = %config.data_dir,
        tenant_prefix = %config.tenant_prefix,
        database = %config.database,
        max_attempts = config.engine.max_attempts,
        "Loader configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);
    let loader = Loader::new(store, config)?;

    match cli.command {
        Command::Provision { tenant } => {
            let outcome = loader.provision(&tenant).await?;
            let status = if outcome.created {
                "created"
            } else {
                "already exists"
            };
            println!("{}: {status}", outcome.database);
        }
        Command::Seed { tenant } => {
            let report = loader.seed(tenant.as_deref()).await?;
            println!(
                "{}: cleared {}, inserted {} users and {} schools, linked {} schools",
                report.database,
                report.cleared,
                report.users,
                report.schools,
                report.link.linked_children
            );
        }
        Command::Copy { tenant } => {
            let report = loader.copy(tenant.as_deref()).await?;
            let linked = report.link.map_or(0, |link| link.linked_children);
            println!(
                "{}: copied {} users and {} schools, linked {linked} schools",
                report.database, report.users, report.schools
            );
        }
        Command::SeedSports => {
            let report = loader.seed_sports().await?;
            println!(
                "{}: cleared {}, inserted {} seasons, {} athletes, {} races and {} results",
                report.database,
                report.cleared,
                report.seasons,
                report.athletes,
                report.races,
                report.results
            );
        }
    }

    Ok(())
}
