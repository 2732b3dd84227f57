//! Connection pool construction.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::config::{DatabaseConfig, SourceConfig};
use crate::error::{AppError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a PostgreSQL pool and verify it with a round trip.
pub async fn connect_pg(config: &DatabaseConfig) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(POOL_CONNECTION_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| AppError::pool(e, "creating PostgreSQL pool"))?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::pool(e, "testing PostgreSQL connection"))?;

    info!(
        "Connected to PostgreSQL: {}:{}/{}",
        config.host, config.port, config.database
    );

    Ok(pool)
}

/// Create a MySQL pool for the migration source and verify it.
pub async fn connect_mysql(config: &SourceConfig) -> Result<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password);

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(POOL_CONNECTION_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| AppError::pool(e, "creating MySQL source pool"))?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::pool(e, "testing MySQL source connection"))?;

    info!(
        "Connected to MySQL source: {}:{}/{}",
        config.host, config.port, config.database
    );

    Ok(pool)
}

/// Apply the embedded schema migrations to the service database.
pub async fn run_schema_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Schema migrations applied");
    Ok(())
}
