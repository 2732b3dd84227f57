//! Configuration loading and validation.
//!
//! The service reads a YAML file; the migration tool reads its connection
//! parameters from environment variables since it is run once, by an
//! operator, outside the service deployment.

mod types;
mod validation;

pub use types::*;

use std::env;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Secrets may be supplied via the environment instead of the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(password) = env::var("CRECHE_DB_PASSWORD") {
            self.database.password = password;
        }
    }
}

impl MigrationConfig {
    /// Build a migration configuration from `MIGRATE_*` environment variables.
    ///
    /// Required: `MIGRATE_MYSQL_HOST`, `MIGRATE_MYSQL_DATABASE`,
    /// `MIGRATE_MYSQL_USER`, `MIGRATE_PG_HOST`, `MIGRATE_PG_DATABASE`,
    /// `MIGRATE_PG_USER`. Ports, passwords and the report path fall back to
    /// defaults.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            source: SourceConfig {
                host: require_env("MIGRATE_MYSQL_HOST")?,
                port: env_or("MIGRATE_MYSQL_PORT", 3306)?,
                database: require_env("MIGRATE_MYSQL_DATABASE")?,
                user: require_env("MIGRATE_MYSQL_USER")?,
                password: env::var("MIGRATE_MYSQL_PASSWORD").unwrap_or_default(),
                max_connections: env_or("MIGRATE_MYSQL_CONNECTIONS", 4)?,
            },
            target: DatabaseConfig {
                host: require_env("MIGRATE_PG_HOST")?,
                port: env_or("MIGRATE_PG_PORT", 5432)?,
                database: require_env("MIGRATE_PG_DATABASE")?,
                user: require_env("MIGRATE_PG_USER")?,
                password: env::var("MIGRATE_PG_PASSWORD").unwrap_or_default(),
                max_connections: env_or("MIGRATE_PG_CONNECTIONS", 4)?,
            },
            report_path: env::var("MIGRATE_REPORT_PATH")
                .unwrap_or_else(|_| "migration-report.json".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_migration(self)
    }

    /// SHA256 hash of the effective configuration, recorded in the report.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn require_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Config(format!("environment variable {key} is not set")))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| AppError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
