//! The loader's top-level jobs.
//!
//! All jobs run against one store and share one [`RateController`], so a throttled clear of one
//! collection also slows the concurrent clear of the other.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{info, instrument, warn};

use bulkload_core::{Filter, Namespace};
use bulkload_engine::{BatchEngine, LinkReport, Provisioned, RateController, TenantProvisioner};
use bulkload_store::DocumentStore;

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::fixtures;

/// Field on each user holding its linked school identifiers.
pub const LINK_FIELD: &str = "schools";

const USERS: &str = "users";
const SCHOOLS: &str = "schools";
const USERS_COPY: &str = "users_new";
const SCHOOLS_COPY: &str = "schools_new";
const SEASONS: &str = "seasons";
const ATHLETES: &str = "athletes";
const RACES: &str = "races";
const RESULTS: &str = "results";

/// Outcome of [`Loader::seed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Database that was seeded.
    pub database: String,
    /// Documents removed from `users` and `schools` before seeding.
    pub cleared: u64,
    /// Users inserted.
    pub users: usize,
    /// Schools inserted.
    pub schools: usize,
    /// Linking counts.
    pub link: LinkReport,
}

/// Outcome of [`Loader::copy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Database that was copied within.
    pub database: String,
    /// Users copied to `users_new`.
    pub users: u64,
    /// Schools copied to `schools_new`.
    pub schools: u64,
    /// Linking counts, or `None` when either copy was empty.
    pub link: Option<LinkReport>,
}

/// Outcome of [`Loader::seed_sports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SportsReport {
    /// Database that was seeded.
    pub database: String,
    /// Documents removed from the four collections before generating.
    pub cleared: u64,
    /// Seasons inserted.
    pub seasons: usize,
    /// Athletes inserted.
    pub athletes: usize,
    /// Races inserted.
    pub races: usize,
    /// Race results inserted.
    pub results: usize,
}

/// Runs provisioning, seeding and copy jobs against one store.
pub struct Loader<S: ?Sized> {
    config: LoaderConfig,
    engine: BatchEngine<S>,
    provisioner: TenantProvisioner<S>,
}

impl<S: DocumentStore + ?Sized> Loader<S> {
    /// Wire the engine and provisioner over `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine configuration is invalid.
    pub fn new(store: Arc<S>, config: LoaderConfig) -> Result<Self> {
        let rate = Arc::new(RateController::new(&config.engine));
        let engine = BatchEngine::new(Arc::clone(&store), rate, config.engine.clone())?;
        let provisioner = TenantProvisioner::new(store, config.tenant_prefix.clone());
        Ok(Self {
            config,
            engine,
            provisioner,
        })
    }

    /// The engine shared by all jobs.
    pub fn engine(&self) -> &BatchEngine<S> {
        &self.engine
    }

    /// Create the tenant's database if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid tenant name or a store failure.
    pub async fn provision(&self, tenant: &str) -> Result<Provisioned> {
        Ok(self.provisioner.ensure_tenant(tenant).await?)
    }

    /// Clear `users` and `schools`, generate fresh fixtures and link them.
    ///
    /// With a tenant, its database is provisioned first; otherwise the configured database is
    /// used.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step. Completed steps are not undone.
    #[instrument(skip(self))]
    pub async fn seed(&self, tenant: Option<&str>) -> Result<SeedReport> {
        let database = self.target_database(tenant).await?;
        let users_ns = Namespace::new(&database, USERS);
        let schools_ns = users_ns.sibling(SCHOOLS);

        let cleared = self.clear(&[&users_ns, &schools_ns]).await?;
        info!(cleared, "Cleared existing data");

        let users = fixtures::users(self.config.users);
        let user_ids = self.engine.insert_chunked(&users_ns, users).await?;
        info!(users = user_ids.len(), "Inserted users");

        let school_count = self.config.users.saturating_mul(self.config.schools_per_user);
        let schools = fixtures::schools(school_count);
        let school_ids = self.engine.insert_chunked(&schools_ns, schools).await?;
        info!(schools = school_ids.len(), "Inserted schools");

        let link = self
            .engine
            .link(
                &users_ns,
                &user_ids,
                &school_ids,
                self.config.schools_per_user,
                LINK_FIELD,
            )
            .await?;

        Ok(SeedReport {
            database,
            cleared,
            users: user_ids.len(),
            schools: school_ids.len(),
            link,
        })
    }

    /// Copy `users` and `schools` into `users_new` and `schools_new`, then relink the copies.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step. Completed steps are not undone.
    #[instrument(skip(self))]
    pub async fn copy(&self, tenant: Option<&str>) -> Result<CopyReport> {
        let database = self.target_database(tenant).await?;
        let users_ns = Namespace::new(&database, USERS);
        let schools_ns = users_ns.sibling(SCHOOLS);
        let users_copy = users_ns.sibling(USERS_COPY);
        let schools_copy = users_ns.sibling(SCHOOLS_COPY);

        let cleared = self.clear(&[&users_copy, &schools_copy]).await?;
        info!(cleared, "Cleared copy targets");

        let users = self.copy_if_present(&users_ns, &users_copy).await?;
        let schools = self.copy_if_present(&schools_ns, &schools_copy).await?;

        let user_ids = self.engine.list_ids(&users_copy).await?;
        let school_ids = self.engine.list_ids(&schools_copy).await?;
        let link = if user_ids.is_empty() || school_ids.is_empty() {
            warn!("Nothing to link after copy");
            None
        } else {
            Some(
                self.engine
                    .link(
                        &users_copy,
                        &user_ids,
                        &school_ids,
                        self.config.copy_link_window,
                        LINK_FIELD,
                    )
                    .await?,
            )
        };

        Ok(CopyReport {
            database,
            users,
            schools,
            link,
        })
    }

    /// Clear and regenerate the sports league in the configured sports database.
    ///
    /// Seasons and athletes go in first; each season then gets its races, and each race a
    /// finishing order drawn from the inserted athletes. Races and results refer to their
    /// season, race and athlete by identifier string.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step. Completed steps are not undone.
    #[instrument(skip(self))]
    pub async fn seed_sports(&self) -> Result<SportsReport> {
        let config = &self.config;
        let seasons_ns = Namespace::new(&config.sports_database, SEASONS);
        let athletes_ns = seasons_ns.sibling(ATHLETES);
        let races_ns = seasons_ns.sibling(RACES);
        let results_ns = seasons_ns.sibling(RESULTS);

        let cleared = self
            .clear_in_turn(&[&seasons_ns, &athletes_ns, &races_ns, &results_ns])
            .await?;
        info!(cleared, "Cleared existing data");

        let seasons = fixtures::seasons(config.seasons);
        let season_ids = self.engine.insert_chunked(&seasons_ns, seasons).await?;
        info!(seasons = season_ids.len(), "Inserted seasons");

        let athletes = fixtures::athletes(config.athletes);
        let athlete_ids: Vec<String> = self
            .engine
            .insert_chunked(&athletes_ns, athletes)
            .await?
            .iter()
            .map(ToString::to_string)
            .collect();
        info!(athletes = athlete_ids.len(), "Inserted athletes");

        let races: Vec<_> = season_ids
            .iter()
            .zip(fixtures::FIRST_SEASON_YEAR..)
            .flat_map(|(season_id, year)| {
                let season_id = season_id.to_string();
                (0..config.races_per_season).map(move |index| {
                    fixtures::race(&season_id, year, index, config.races_per_season)
                })
            })
            .collect();
        let race_ids = self.engine.insert_chunked(&races_ns, races).await?;
        info!(races = race_ids.len(), "Inserted races");

        let results: Vec<_> = race_ids
            .iter()
            .enumerate()
            .flat_map(|(index, race_id)| {
                fixtures::results(
                    &race_id.to_string(),
                    index,
                    &athlete_ids,
                    config.athletes_per_race,
                )
            })
            .collect();
        let result_ids = self.engine.insert_chunked(&results_ns, results).await?;
        info!(results = result_ids.len(), "Inserted results");

        Ok(SportsReport {
            database: config.sports_database.clone(),
            cleared,
            seasons: season_ids.len(),
            athletes: athlete_ids.len(),
            races: race_ids.len(),
            results: result_ids.len(),
        })
    }

    async fn target_database(&self, tenant: Option<&str>) -> Result<String> {
        match tenant {
            Some(tenant) => Ok(self.provision(tenant).await?.database),
            None => Ok(self.config.database.clone()),
        }
    }

    /// Delete everything from several collections concurrently.
    async fn clear(&self, namespaces: &[&Namespace]) -> Result<u64> {
        let filter = Filter::All;
        let deleted = try_join_all(
            namespaces
                .iter()
                .map(|ns| self.engine.delete_all(ns, &filter)),
        )
        .await?;
        Ok(deleted.into_iter().sum())
    }

    /// Delete everything from several collections, one after another.
    async fn clear_in_turn(&self, namespaces: &[&Namespace]) -> Result<u64> {
        let filter = Filter::All;
        let mut deleted = 0;
        for ns in namespaces {
            deleted += self.engine.delete_all(ns, &filter).await?;
        }
        Ok(deleted)
    }

    async fn copy_if_present(&self, source: &Namespace, destination: &Namespace) -> Result<u64> {
        if self.engine.count(source).await? == 0 {
            info!(source = %source, "Source is empty, nothing to copy");
            return Ok(0);
        }
        Ok(self.engine.copy_all(source, destination).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkload_store::MemoryStore;

    fn small_config() -> LoaderConfig {
        LoaderConfig {
            users: 12,
            schools_per_user: 3,
            ..LoaderConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn seed_without_tenant_uses_configured_database() {
        let store = Arc::new(MemoryStore::new());
        let loader = Loader::new(Arc::clone(&store), small_config()).unwrap();

        let report = loader.seed(None).await.unwrap();

        assert_eq!(report.database, "AuthDB");
        assert_eq!(report.users, 12);
        assert_eq!(report.schools, 36);
        assert_eq!(report.link.linked_children, 36);
        assert!(store.schema("AuthDB").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn copy_of_empty_database_links_nothing() {
        let store = Arc::new(MemoryStore::new());
        let loader = Loader::new(Arc::clone(&store), small_config()).unwrap();

        let report = loader.copy(None).await.unwrap();

        assert_eq!(report.users, 0);
        assert_eq!(report.schools, 0);
        assert!(report.link.is_none());
    }
}
