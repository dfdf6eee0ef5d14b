//! Health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::catalog::CatalogSource;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the catalog snapshot cannot be loaded.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog().load().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
