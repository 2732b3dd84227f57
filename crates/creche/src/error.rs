//! Error types shared by the service and the migration tool.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Main error type for service and migration operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error (invalid YAML, missing env vars, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request failed validation (missing or malformed fields).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entity exists but is in a state that forbids the operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller identity missing or not acceptable.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Database query or transaction error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Schema migration error: {0}")]
    Schema(#[from] sqlx::migrate::MigrateError),

    /// Connection pool error with context about where it occurred.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Data migration failed for a specific table.
    #[error("Migration failed for table {table}: {message}")]
    Migration { table: String, message: String },

    /// IO error (report files, config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Create a NotFound error.
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    /// Create a Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        AppError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Migration error for a table.
    pub fn migration(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Migration {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to API clients. Internal failures are replaced
    /// with a generic message; the detail is logged server-side instead.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Unauthorized(m) => m.clone(),
            _ => "internal server error".to_string(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Validation(_) | AppError::Yaml(_) => 2,
            AppError::Migration { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self.format_detailed());
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for service and migration operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::migration("users", "boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = AppError::pool("connection refused", "creating target pool");
        assert_eq!(err.public_message(), "internal server error");

        let err = AppError::not_found("enrollment 7 not found");
        assert_eq!(err.public_message(), "enrollment 7 not found");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(AppError::Config("bad".into()).exit_code(), 2);
        assert_eq!(AppError::migration("users", "boom").exit_code(), 3);
        assert_eq!(
            AppError::pool("refused", "creating source pool").exit_code(),
            1
        );
    }
}
