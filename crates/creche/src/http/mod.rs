//! HTTP surface: thin JSON adapters over the enrollment store.

mod handlers;

pub use handlers::StaffIdentity;

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::enrollment::EnrollmentStore;
use crate::error::Result;
use crate::settings::SettingsStore;

/// Header carrying the staff identity established by the upstream
/// authentication middleware.
pub const STAFF_ID_HEADER: &str = "x-staff-id";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EnrollmentStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub config: Arc<Config>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(STAFF_ID_HEADER)]);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/enrollments",
            post(handlers::create_enrollment).get(handlers::list_enrollments),
        )
        .route("/api/enrollments/{id}", get(handlers::get_enrollment))
        .route(
            "/api/enrollments/{id}/approve",
            put(handlers::approve_enrollment),
        )
        .route(
            "/api/enrollments/{id}/reject",
            put(handlers::reject_enrollment),
        )
        .route(
            "/api/enrollments/{id}/documents",
            post(handlers::attach_documents),
        )
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/settings/{key}", put(handlers::put_setting))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the cancellation token fires.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let address = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server shut down");
    Ok(())
}
