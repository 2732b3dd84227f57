//! Configuration validation.

use crate::error::{AppError, Result};

use super::types::{Config, DatabaseConfig, MigrationConfig, SourceConfig};

/// Validate the service configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.server.host.trim().is_empty() {
        return Err(AppError::Config("server.host must not be empty".into()));
    }
    if config.server.port == 0 {
        return Err(AppError::Config("server.port must not be 0".into()));
    }
    if config.server.max_upload_bytes <= 0 {
        return Err(AppError::Config(
            "server.max_upload_bytes must be positive".into(),
        ));
    }
    if config.server.allowed_mime_types.is_empty() {
        return Err(AppError::Config(
            "server.allowed_mime_types must not be empty".into(),
        ));
    }
    validate_database("database", &config.database)
}

/// Validate a migration configuration.
pub fn validate_migration(config: &MigrationConfig) -> Result<()> {
    validate_source("source", &config.source)?;
    validate_database("target", &config.target)?;
    if config.report_path.trim().is_empty() {
        return Err(AppError::Config("report_path must not be empty".into()));
    }
    Ok(())
}

fn validate_database(section: &str, db: &DatabaseConfig) -> Result<()> {
    for (field, value) in [
        ("host", &db.host),
        ("database", &db.database),
        ("user", &db.user),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{section}.{field} must not be empty"
            )));
        }
    }
    if db.port == 0 {
        return Err(AppError::Config(format!("{section}.port must not be 0")));
    }
    if db.max_connections == 0 {
        return Err(AppError::Config(format!(
            "{section}.max_connections must be at least 1"
        )));
    }
    Ok(())
}

fn validate_source(section: &str, db: &SourceConfig) -> Result<()> {
    for (field, value) in [
        ("host", &db.host),
        ("database", &db.database),
        ("user", &db.user),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{section}.{field} must not be empty"
            )));
        }
    }
    if db.port == 0 {
        return Err(AppError::Config(format!("{section}.port must not be 0")));
    }
    Ok(())
}
