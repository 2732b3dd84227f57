//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Service database configuration (PostgreSQL).
    pub database: DatabaseConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0).
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port (default: 8080).
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Maximum accepted document size in bytes (default: 10 MB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: i64,

    /// MIME types accepted for enrollment documents.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl ServerConfig {
    /// Whether a candidate document passes the upload constraints.
    pub fn accepts_document(&self, mime_type: &str, size_bytes: i64) -> bool {
        size_bytes <= self.max_upload_bytes
            && self
                .allowed_mime_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }
}

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Maximum pooled connections (default: 10).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Migration source (MySQL) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_source_connections")]
    pub max_connections: u32,
}

/// Configuration for a migration run: MySQL snapshot in, PostgreSQL out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source database (MySQL).
    pub source: SourceConfig,

    /// Target database (PostgreSQL).
    pub target: DatabaseConfig,

    /// Path the JSON report is written to.
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> i64 {
    10 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "application/pdf".to_string(),
    ]
}

fn default_pg_port() -> u16 {
    5432
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_max_connections() -> u32 {
    10
}

fn default_source_connections() -> u32 {
    4
}

fn default_report_path() -> String {
    "migration-report.json".to_string()
}
