//! Command-line parsing.

use clap::{Parser, Subcommand};

use crate::config::CONFIG_PATH_VAR;

/// Rate-limited bulk loader for tenant document stores.
#[derive(Parser, Debug)]
#[command(name = "bulkload")]
#[command(about = "Rate-limited bulk loader for tenant document stores", long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, env = CONFIG_PATH_VAR)]
    pub config: Option<String>,

    /// Job to run
    #[command(subcommand)]
    pub command: Command,
}

/// A top-level job.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a tenant database if missing
    Provision {
        /// Tenant name
        tenant: String,
    },
    /// Clear and regenerate linked users and schools
    Seed {
        /// Target tenant; the configured database when absent
        tenant: Option<String>,
    },
    /// Copy users and schools into fresh collections and relink them
    Copy {
        /// Target tenant; the configured database when absent
        tenant: Option<String>,
    },
    /// Clear and regenerate seasons, athletes, races and race results
    SeedSports,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("bulkload").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_each_job() {
        assert_eq!(
            parse(&["provision", "acme"]).unwrap(),
            Command::Provision {
                tenant: "acme".into()
            }
        );
        assert_eq!(parse(&["seed"]).unwrap(), Command::Seed { tenant: None });
        assert_eq!(
            parse(&["copy", "acme"]).unwrap(),
            Command::Copy {
                tenant: Some("acme".into())
            }
        );
        assert_eq!(parse(&["seed-sports"]).unwrap(), Command::SeedSports);
    }

    #[test]
    fn config_flag_precedes_the_job() {
        let cli = Cli::try_parse_from(["bulkload", "--config", "/etc/bulkload.json", "seed"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/bulkload.json"));
        assert_eq!(cli.command, Command::Seed { tenant: None });
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["provision"]).is_err());
        assert!(parse(&["seed", "a", "b"]).is_err());
        assert!(parse(&["migrate"]).is_err());
        assert!(parse(&["seed-sports", "acme"]).is_err());
    }
}
