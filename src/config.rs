//! Runtime configuration for storage access and classifier behavior.
//!
//! Connection parameters are read from the environment once and carried in
//! an explicit [`StorageConfig`] value; nothing in the pipeline consults
//! process-wide state after construction, so tests can exercise several
//! configurations side by side.

use std::env;

use clap::ValueEnum;

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Maintenance database used for existence checks and `CREATE DATABASE`.
    pub admin_db: String,
}

impl StorageConfig {
    /// Builds a configuration from `POSTGRES_*` environment variables,
    /// falling back to local-development defaults.
    pub fn from_env() -> Self {
        let port = env::var("POSTGRES_PORT")
            .ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(DEFAULT_POSTGRES_PORT);
        StorageConfig {
            host: env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port,
            user: env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("POSTGRES_PASSWORD").unwrap_or_default(),
            admin_db: env::var("POSTGRES_ADMIN_DB").unwrap_or_else(|_| "postgres".to_string()),
        }
    }

    /// Connection settings targeting `dbname`, or the admin database when
    /// `dbname` is `None`.
    pub fn pg_config(&self, dbname: Option<&str>) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(dbname.unwrap_or(&self.admin_db));
        config
    }
}

/// Policy for attachment filenames that match no known report prefix.
///
/// `Strict` skips them outright; `Guess` derives a table name from the
/// first word of the filename and reports what it would have targeted.
/// Either way nothing is written for an unknown type; the guess only
/// changes what the skip outcome says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ClassifierMode {
    Strict,
    Guess,
}

impl Default for ClassifierMode {
    fn default() -> Self {
        ClassifierMode::Strict
    }
}
