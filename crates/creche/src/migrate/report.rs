//! Migration run report, persisted for audit.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 of the effective configuration.
    pub config_hash: String,

    /// Final status: completed, failed, cancelled or dry_run.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table outcome, in migration order.
    pub tables: Vec<TableReport>,

    /// Row-count comparison, empty when the run aborted early.
    pub validation: Vec<CountCheck>,
}

/// Outcome for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_exported: usize,
    pub rows_imported: usize,
    pub rows_failed: usize,
    pub duration_ms: u64,

    /// Row-level failures, tolerated and recorded.
    pub errors: Vec<RowError>,

    /// Table-level failure, fatal for the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableReport {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            rows_exported: 0,
            rows_imported: 0,
            rows_failed: 0,
            duration_ms: 0,
            errors: Vec::new(),
            error: None,
        }
    }

    /// Record a tolerated row-level failure.
    pub fn record_row_error(&mut self, row: usize, message: impl Into<String>) {
        self.rows_failed += 1;
        self.errors.push(RowError {
            row,
            message: message.into(),
        });
    }
}

/// A single tolerated row failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based index of the row in export order.
    pub row: usize,
    pub message: String,
}

/// Row-count comparison for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountCheck {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
    pub matched: bool,
}

impl MigrationReport {
    /// Persist the report as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Migration report written to {:?}", path.as_ref());
        Ok(())
    }

    /// Load a previously written report.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether any table recorded row-level failures.
    pub fn has_row_errors(&self) -> bool {
        self.tables.iter().any(|t| t.rows_failed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> MigrationReport {
        let mut users = TableReport::new("users");
        users.rows_exported = 3;
        users.rows_imported = 2;
        users.record_row_error(1, "column role: unknown role 'superuser'");

        MigrationReport {
            run_id: "run-1".into(),
            config_hash: "abc123".into(),
            status: "completed".into(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 1.5,
            tables: vec![users],
            validation: vec![CountCheck {
                table: "users".into(),
                source_rows: 3,
                target_rows: 2,
                matched: false,
            }],
        }
    }

    #[test]
    fn report_save_load_round_trip() {
        let report = sample();
        let file = NamedTempFile::new().unwrap();
        report.save(file.path()).unwrap();

        let loaded = MigrationReport::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.tables.len(), 1);
        assert_eq!(loaded.tables[0].rows_failed, 1);
        assert_eq!(loaded.tables[0].errors[0].row, 1);
        assert!(!loaded.validation[0].matched);
        assert!(loaded.has_row_errors());
    }

    #[test]
    fn report_is_pretty_json() {
        let report = sample();
        let file = NamedTempFile::new().unwrap();
        report.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains('\n'));
        assert!(content.contains("\"run_id\""));
    }
}
