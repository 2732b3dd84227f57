//! # creche
//!
//! Backend for a nursery (crèche) management application:
//!
//! - **Enrollment transaction engine**: create, approve and reject
//!   applications with all-or-nothing semantics over PostgreSQL. Approval
//!   converts a pending enrollment into a parent account, a child record and
//!   a copied document set inside one row-locked transaction.
//! - **HTTP API**: thin axum adapters over the engine.
//! - **Migration tool**: a one-shot batch that moves a legacy MySQL snapshot
//!   into PostgreSQL table by table, converting type representations and
//!   reporting per-row failures and row-count mismatches.
//!
//! ## Example
//!
//! ```rust,no_run
//! use creche::config::MigrationConfig;
//! use creche::migrate::Migrator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> creche::Result<()> {
//!     let config = MigrationConfig::from_env()?;
//!     let migrator = Migrator::connect(config).await?;
//!     let report = migrator.run(CancellationToken::new(), false).await?;
//!     println!("migrated {} tables", report.tables.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod enrollment;
pub mod error;
pub mod http;
pub mod migrate;
pub mod model;
pub mod settings;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, MigrationConfig, ServerConfig, SourceConfig};
pub use enrollment::{EnrollmentStore, InMemoryEnrollmentStore, PgEnrollmentStore};
pub use error::{AppError, Result};
pub use http::{build_router, serve, AppState};
pub use migrate::{MigrationReport, Migrator};
pub use settings::{InMemorySettingsStore, PgSettingsStore, SettingsStore};
