//! creche CLI - nursery enrollment service and MySQL to PostgreSQL migration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use creche::config::MigrationConfig;
use creche::migrate::Migrator;
use creche::{db, AppError, AppState, Config, PgEnrollmentStore, PgSettingsStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "creche")]
#[command(about = "Nursery enrollment service and data migration toolkit")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (service commands)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Override bind host
        #[arg(long)]
        host: Option<String>,

        /// Override bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the MySQL to PostgreSQL data migration (connection parameters
    /// come from MIGRATE_* environment variables)
    Migrate {
        /// Override the report output path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Export and convert only; do not write to the target
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare per-table row counts between source and target
    Validate,

    /// Test the service database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);

            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let pool = db::connect_pg(&config.database).await?;
            db::run_schema_migrations(&pool).await?;

            let cancel = setup_signal_handler()?;
            let state = AppState {
                store: Arc::new(PgEnrollmentStore::new(pool.clone())),
                settings: Arc::new(PgSettingsStore::new(pool)),
                config: Arc::new(config),
            };

            creche::serve(state, cancel).await?;
        }

        Commands::Migrate { report, dry_run } => {
            dotenvy::dotenv().ok();
            let mut config = MigrationConfig::from_env()?;
            if let Some(path) = report {
                config.report_path = path.to_string_lossy().into_owned();
            }
            let report_path = config.report_path.clone();

            let cancel = setup_signal_handler()?;
            let migrator = Migrator::connect(config).await?;
            let result = migrator.run(cancel, dry_run).await?;

            let headline = if dry_run {
                "Dry run completed!"
            } else {
                "Migration completed!"
            };
            println!("\n{headline}");
            println!("  Run ID: {}", result.run_id);
            println!("  Duration: {:.2}s", result.duration_seconds);
            println!("  Tables: {}", result.tables.len());
            for table in &result.tables {
                println!(
                    "    {}: exported {}, imported {}, failed rows {}",
                    table.table, table.rows_exported, table.rows_imported, table.rows_failed
                );
            }
            let mismatches: Vec<_> = result
                .validation
                .iter()
                .filter(|check| !check.matched)
                .collect();
            if !mismatches.is_empty() {
                println!("  Count mismatches:");
                for check in mismatches {
                    println!(
                        "    {}: source={} target={}",
                        check.table, check.source_rows, check.target_rows
                    );
                }
            }
            println!("  Report: {report_path}");
        }

        Commands::Validate => {
            dotenvy::dotenv().ok();
            let config = MigrationConfig::from_env()?;
            let migrator = Migrator::connect(config).await?;
            let checks = migrator.validate().await?;

            println!("Row-count validation:");
            for check in &checks {
                let marker = if check.matched { "OK" } else { "MISMATCH" };
                println!(
                    "  {}: source={} target={} [{}]",
                    check.table, check.source_rows, check.target_rows, marker
                );
            }
        }

        Commands::HealthCheck => {
            let config = Config::load(&cli.config)?;
            let started = Instant::now();
            db::connect_pg(&config.database).await?;
            println!(
                "Database (PostgreSQL): OK ({}ms)",
                started.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (container shutdown).
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, AppError> {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Shutting down gracefully...");
        token_int.cancel();
    });

    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Shutting down gracefully...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for non-unix targets (only Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, AppError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
        token.cancel();
    });

    Ok(cancel_token)
}
