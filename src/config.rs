use std::env;
use std::path::PathBuf;

use clap::Parser;

use crate::error::{SeedError, SeedResult};

/// Variables checked, in order, for the connection string
pub const DATABASE_URL_VARS: [&str; 2] = ["DATABASE_URL", "DB_SOURCE"];

#[derive(Parser, Debug)]
#[command(
    name = "rbac-seed",
    version,
    about = "Synchronize declarative roles and permissions into the RBAC tables"
)]
pub struct Cli {
    /// Path to the RBAC definition file
    #[arg(short, long, default_value = "rbac_config.yaml")]
    pub file: PathBuf,

    /// Connection string; falls back to DATABASE_URL, then DB_SOURCE
    #[arg(long)]
    pub database_url: Option<String>,

    /// Dotenv file to load before reading the environment (default: .env if present)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Reconcile inside a transaction and roll it back instead of committing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

// Connection strings carry credentials
impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings").field("url", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub rbac_file: PathBuf,
    pub database: DatabaseSettings,
    pub dry_run: bool,
}

impl Settings {
    /// Resolve settings from the command line and the process environment.
    ///
    /// This is the only place the environment is read.
    pub fn from_cli(cli: Cli) -> SeedResult<Self> {
        match &cli.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    SeedError::Configuration(format!(
                        "failed to load env file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        let url = cli
            .database_url
            .or_else(|| database_url_from(|var| env::var(var).ok()))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SeedError::Configuration(format!(
                    "database URL is not set; pass --database-url or set {}",
                    DATABASE_URL_VARS.join(" or ")
                ))
            })?;

        Ok(Self {
            rbac_file: cli.file,
            database: DatabaseSettings { url },
            dry_run: cli.dry_run,
        })
    }
}

/// First non-blank value among [`DATABASE_URL_VARS`]
fn database_url_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    DATABASE_URL_VARS
        .iter()
        .filter_map(|&var| lookup(var))
        .find(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn explicit_url_wins() {
        let cli = Cli::parse_from([
            "rbac-seed",
            "--file",
            "roles.yaml",
            "--database-url",
            "postgres://localhost/app",
            "--env-file",
            "/dev/null",
            "--dry-run",
        ]);

        let settings = Settings::from_cli(cli).unwrap();
        assert_eq!(settings.rbac_file, PathBuf::from("roles.yaml"));
        assert_eq!(settings.database.url, "postgres://localhost/app");
        assert!(settings.dry_run);
    }

    #[test]
    fn blank_url_is_a_configuration_error() {
        let cli = Cli::parse_from([
            "rbac-seed",
            "--database-url",
            "  ",
            "--env-file",
            "/dev/null",
        ]);
        assert!(matches!(
            Settings::from_cli(cli),
            Err(SeedError::Configuration(_))
        ));
    }

    #[test]
    fn unreadable_env_file_is_a_configuration_error() {
        let cli = Cli::parse_from([
            "rbac-seed",
            "--database-url",
            "postgres://localhost/app",
            "--env-file",
            "/nonexistent/app.env",
        ]);
        assert!(matches!(
            Settings::from_cli(cli),
            Err(SeedError::Configuration(_))
        ));
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["rbac-seed"]);
        assert_eq!(cli.file, PathBuf::from("rbac_config.yaml"));
        assert!(!cli.dry_run);
        assert!(cli.database_url.is_none());
    }

    #[test]
    fn blank_database_url_falls_back_to_db_source() {
        let vars = HashMap::from([
            ("DATABASE_URL", "".to_string()),
            ("DB_SOURCE", "postgres://localhost/app".to_string()),
        ]);

        let url = database_url_from(|var| vars.get(var).cloned());
        assert_eq!(url.as_deref(), Some("postgres://localhost/app"));
    }

    #[test]
    fn database_url_takes_precedence_over_db_source() {
        let vars = HashMap::from([
            ("DATABASE_URL", "postgres://primary/app".to_string()),
            ("DB_SOURCE", "postgres://legacy/app".to_string()),
        ]);

        let url = database_url_from(|var| vars.get(var).cloned());
        assert_eq!(url.as_deref(), Some("postgres://primary/app"));
    }

    #[test]
    fn only_blank_values_mean_no_url() {
        let vars = HashMap::from([("DATABASE_URL", " ".to_string())]);
        assert_eq!(database_url_from(|var| vars.get(var).cloned()), None);
    }
}
