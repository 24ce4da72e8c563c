//! Loader configuration.

use std::path::Path;

use serde::Deserialize;

use bulkload_core::EngineConfig;

use crate::error::{CliError, Result};

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_PATH_VAR: &str = "BULKLOAD_CONFIG";

/// Loader configuration: a JSON file (optional) overridden by environment variables.
///
/// The `sports_*` settings drive `seed-sports`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Path to the `RocksDB` data directory (default: "/data/bulkload").
    pub data_dir: String,

    /// Prefix prepended to tenant names to form database names (default: "Keo_").
    pub tenant_prefix: String,

    /// Database used by `seed` and `copy` when no tenant is given (default: "AuthDB").
    pub database: String,

    /// Users generated by `seed` (default: 1000).
    pub users: usize,

    /// Schools generated and linked per user by `seed` (default: 10).
    pub schools_per_user: usize,

    /// Schools linked per user after `copy` (default: 10).
    pub copy_link_window: usize,

    /// Database written by `seed-sports` (default: "sports_db").
    pub sports_database: String,

    /// Seasons generated by `seed-sports` (default: 6).
    pub seasons: usize,

    /// Athletes generated by `seed-sports` (default: 5000).
    pub athletes: usize,

    /// Races generated per season (default: 50).
    pub races_per_season: usize,

    /// Athletes placed in each race (default: 50).
    pub athletes_per_race: usize,

    /// Pacing and batching.
    pub engine: EngineConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/bulkload".into(),
            tenant_prefix: "Keo_".into(),
            database: "AuthDB".into(),
            users: 1000,
            schools_per_user: 10,
            copy_link_window: 10,
            sports_database: "sports_db".into(),
            seasons: 6,
            athletes: 5000,
            races_per_season: 50,
            athletes_per_race: 50,
            engine: EngineConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load the JSON file at `path` (defaults when absent), then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` for an unreadable file, malformed JSON or an unparsable
    /// override, and `CliError::Core` when the engine settings fail validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let config = load_config_file(path)?;
                tracing::info!(path = %path, "Loaded configuration file");
                config
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if a numeric variable does not parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("BULKLOAD_DATA_DIR") {
            self.data_dir = value;
        }
        if let Some(value) = lookup("BULKLOAD_TENANT_PREFIX") {
            self.tenant_prefix = value;
        }
        if let Some(value) = lookup("BULKLOAD_DATABASE") {
            self.database = value;
        }
        override_parsed(&lookup, "BULKLOAD_USERS", &mut self.users)?;
        override_parsed(&lookup, "BULKLOAD_SCHOOLS_PER_USER", &mut self.schools_per_user)?;
        override_parsed(&lookup, "BULKLOAD_COPY_LINK_WINDOW", &mut self.copy_link_window)?;
        if let Some(value) = lookup("BULKLOAD_SPORTS_DATABASE") {
            self.sports_database = value;
        }
        override_parsed(&lookup, "BULKLOAD_SEASONS", &mut self.seasons)?;
        override_parsed(&lookup, "BULKLOAD_ATHLETES", &mut self.athletes)?;
        override_parsed(&lookup, "BULKLOAD_RACES_PER_SEASON", &mut self.races_per_season)?;
        override_parsed(&lookup, "BULKLOAD_ATHLETES_PER_RACE", &mut self.athletes_per_race)?;

        let engine = &mut self.engine;
        override_parsed(&lookup, "BULKLOAD_BASE_DELAY_MS", &mut engine.base_delay_ms)?;
        override_parsed(&lookup, "BULKLOAD_FLOOR_DELAY_MS", &mut engine.floor_delay_ms)?;
        override_parsed(&lookup, "BULKLOAD_THROTTLE_STEP_MS", &mut engine.throttle_step_ms)?;
        override_parsed(&lookup, "BULKLOAD_SUCCESS_STEP_MS", &mut engine.success_step_ms)?;
        override_parsed(
            &lookup,
            "BULKLOAD_INITIAL_RETRY_DELAY_MS",
            &mut engine.initial_retry_delay_ms,
        )?;
        override_parsed(&lookup, "BULKLOAD_MAX_ATTEMPTS", &mut engine.max_attempts)?;
        override_parsed(&lookup, "BULKLOAD_INSERT_BATCH_SIZE", &mut engine.insert_batch_size)?;
        override_parsed(&lookup, "BULKLOAD_DELETE_BATCH_SIZE", &mut engine.delete_batch_size)?;
        override_parsed(&lookup, "BULKLOAD_UPDATE_BATCH_SIZE", &mut engine.update_batch_size)?;
        override_parsed(&lookup, "BULKLOAD_COPY_PAGE_SIZE", &mut engine.copy_page_size)?;
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()> {
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| CliError::Config(format!("{key} must be a number, got {value:?}")))?;
    }
    Ok(())
}

/// Load configuration from a JSON file.
fn load_config_file(path: &str) -> Result<LoaderConfig> {
    let path = Path::new(path);
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| CliError::Config(format!("invalid JSON in {}: {e}", path.display())))
}
