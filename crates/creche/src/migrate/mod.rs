//! One-shot MySQL to PostgreSQL data migration.
//!
//! Tables move in dependency order, one transaction per table: the
//! destination table is cleared, converted rows are inserted under
//! savepoints so a bad row is recorded and skipped, and row counts are
//! compared afterwards. A table-level failure aborts the run; the report is
//! persisted either way.

mod convert;
mod report;

pub use convert::{
    registry, ConvertError, ConvertedRow, PgValue, SourceRow, SourceValue, TableSpec,
};
pub use report::{CountCheck, MigrationReport, RowError, TableReport};

use std::time::Instant;

use chrono::Utc;
use sqlx::mysql::MySqlPool;
use sqlx::postgres::PgPool;
use sqlx::{Acquire, Postgres, QueryBuilder, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::MigrationConfig;
use crate::db;
use crate::error::{AppError, Result};

/// Migration runner over a source and target pool.
pub struct Migrator {
    source: MySqlPool,
    target: PgPool,
    config: MigrationConfig,
}

impl Migrator {
    /// Connect both pools from a migration configuration.
    pub async fn connect(config: MigrationConfig) -> Result<Self> {
        let source = db::connect_mysql(&config.source).await?;
        let target = db::connect_pg(&config.target).await?;
        Ok(Self::new(source, target, config))
    }

    /// Build a migrator from existing pools.
    pub fn new(source: MySqlPool, target: PgPool, config: MigrationConfig) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Run the migration. The report is persisted to the configured path on
    /// every outcome; the returned error reflects fatal failure only.
    pub async fn run(&self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        info!("Starting migration run {run_id} (dry_run: {dry_run})");

        let mut tables = Vec::new();
        let mut fatal: Option<AppError> = None;
        let mut cancelled = false;

        for spec in registry() {
            if cancel.is_cancelled() {
                warn!("Cancellation requested, stopping before table {}", spec.name);
                cancelled = true;
                break;
            }

            let table_start = Instant::now();
            let mut table_report = TableReport::new(spec.name);

            match self.migrate_table(spec, dry_run, &mut table_report).await {
                Ok(()) => {
                    table_report.duration_ms = table_start.elapsed().as_millis() as u64;
                    info!(
                        "{}: exported {}, imported {} ({} failed rows) in {}ms",
                        spec.name,
                        table_report.rows_exported,
                        table_report.rows_imported,
                        table_report.rows_failed,
                        table_report.duration_ms
                    );
                    tables.push(table_report);
                }
                Err(e) => {
                    // Table-level transaction failure: abort the whole run.
                    table_report.duration_ms = table_start.elapsed().as_millis() as u64;
                    table_report.error = Some(e.to_string());
                    error!("{}: aborting run - {}", spec.name, e);
                    tables.push(table_report);
                    fatal = Some(e);
                    break;
                }
            }
        }

        let validation = if fatal.is_none() && !cancelled && !dry_run {
            match self.validate().await {
                Ok(checks) => checks,
                Err(e) => {
                    error!("Row-count validation failed to run: {e}");
                    fatal = Some(e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let completed_at = Utc::now();
        let duration_seconds =
            (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let status = if fatal.is_some() {
            "failed"
        } else if cancelled {
            "cancelled"
        } else if dry_run {
            "dry_run"
        } else {
            "completed"
        };

        let report = MigrationReport {
            run_id,
            config_hash: self.config.hash(),
            status: status.to_string(),
            started_at,
            completed_at,
            duration_seconds,
            tables,
            validation,
        };

        report.save(&self.config.report_path)?;

        info!(
            "Migration {}: {} tables in {:.1}s",
            report.status,
            report.tables.len(),
            report.duration_seconds
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Export, convert and (unless dry-run) import one table.
    async fn migrate_table(
        &self,
        spec: &TableSpec,
        dry_run: bool,
        report: &mut TableReport,
    ) -> Result<()> {
        let rows = self.export(spec).await?;
        report.rows_exported = rows.len();

        if dry_run {
            for (idx, row) in rows.iter().enumerate() {
                if let Err(e) = (spec.convert)(row) {
                    report.record_row_error(idx, e.to_string());
                }
            }
            return Ok(());
        }

        self.import_table(spec, &rows, report).await
    }

    /// Snapshot all rows of a source table. A missing table is zero rows.
    async fn export(&self, spec: &TableSpec) -> Result<Vec<SourceRow>> {
        let sql = format!(
            "SELECT * FROM `{}` ORDER BY `{}`",
            spec.name, spec.order_by
        );

        match sqlx::query(&sql).fetch_all(&self.source).await {
            Ok(rows) => Ok(rows.iter().map(SourceRow::from_mysql).collect()),
            Err(e) if is_missing_table(&e) => {
                warn!("{}: source table does not exist, treating as empty", spec.name);
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::migration(spec.name, e)),
        }
    }

    /// Clear the destination table and insert converted rows, each under a
    /// savepoint so one bad row does not abort the table.
    async fn import_table(
        &self,
        spec: &TableSpec,
        rows: &[SourceRow],
        report: &mut TableReport,
    ) -> Result<()> {
        let mut tx = self
            .target
            .begin()
            .await
            .map_err(|e| AppError::migration(spec.name, e))?;

        // Dependents are truncated along with their parent; they re-import
        // later in the run, in dependency order.
        sqlx::query(&format!(
            "TRUNCATE TABLE \"{}\" RESTART IDENTITY CASCADE",
            spec.name
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::migration(spec.name, e))?;

        let mut imported = 0usize;
        for (idx, source_row) in rows.iter().enumerate() {
            let converted = match (spec.convert)(source_row) {
                Ok(converted) => converted,
                Err(e) => {
                    report.record_row_error(idx, e.to_string());
                    continue;
                }
            };

            let mut savepoint = tx
                .begin()
                .await
                .map_err(|e| AppError::migration(spec.name, e))?;

            match insert_row(&mut savepoint, spec.name, &converted).await {
                Ok(()) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| AppError::migration(spec.name, e))?;
                    imported += 1;
                }
                Err(e) => {
                    savepoint
                        .rollback()
                        .await
                        .map_err(|rollback_err| AppError::migration(spec.name, rollback_err))?;
                    report.record_row_error(idx, e.to_string());
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::migration(spec.name, e))?;

        report.rows_imported = imported;
        Ok(())
    }

    /// Compare per-table row counts. Mismatches are flagged, never fatal.
    pub async fn validate(&self) -> Result<Vec<CountCheck>> {
        let mut checks = Vec::with_capacity(registry().len());

        for spec in registry() {
            let source_rows = self.source_count(spec.name).await?;
            let target_rows = self.target_count(spec.name).await?;
            let matched = source_rows == target_rows;

            if matched {
                info!("{}: {} rows (match)", spec.name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    spec.name, source_rows, target_rows
                );
            }

            checks.push(CountCheck {
                table: spec.name.to_string(),
                source_rows,
                target_rows,
                matched,
            });
        }

        Ok(checks)
    }

    async fn source_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM `{table}`");
        match sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.source).await {
            Ok(count) => Ok(count),
            Err(e) if is_missing_table(&e) => Ok(0),
            Err(e) => Err(AppError::migration(table, e)),
        }
    }

    async fn target_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM \"{table}\"");
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.target)
            .await
            .map_err(|e| AppError::migration(table, e))
    }
}

/// Insert one converted row inside the given (savepoint) transaction.
async fn insert_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    row: &ConvertedRow,
) -> std::result::Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("INSERT INTO \"{table}\" ("));

    let mut columns = builder.separated(", ");
    for column in row.columns {
        columns.push(format!("\"{column}\""));
    }

    builder.push(") VALUES (");
    let mut values = builder.separated(", ");
    for value in &row.values {
        match value {
            PgValue::Bool(v) => values.push_bind(*v),
            PgValue::Int(v) => values.push_bind(*v),
            PgValue::Text(v) => values.push_bind(v.clone()),
            PgValue::Date(v) => values.push_bind(*v),
            PgValue::Timestamp(v) => values.push_bind(*v),
            PgValue::Status(v) => values.push_bind(*v),
            PgValue::Role(v) => values.push_bind(*v),
        };
    }
    builder.push(")");

    builder.build().execute(&mut **tx).await.map(|_| ())
}

/// MySQL "table doesn't exist" (SQLSTATE 42S02).
fn is_missing_table(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("42S02")
    )
}
