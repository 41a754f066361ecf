//! Health, metrics and status endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;

use super::app::AppState;
use super::metrics::FILES_CATALOGED;
use crate::scanner::ScanState;
use crate::storage::{count_directories, count_files};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Catalog statistics.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub directories: i64,
    pub files: i64,
    pub active_scans: Vec<ActiveScan>,
}

/// A live scan session.
#[derive(Debug, Serialize)]
pub struct ActiveScan {
    pub directory_id: i64,
    pub state: ScanState,
}

/// Create the unauthenticated operational router.
pub fn create_rest_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match state.db.health_check() {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "error"
        }
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status.to_string(),
    };

    let status_code = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(status = ?status_code, database = %db_status, "Health check");

    (status_code, Json(response))
}

/// Prometheus metrics endpoint.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.with_conn(count_files) {
        Ok(files) => FILES_CATALOGED.set(files),
        Err(e) => tracing::warn!(error = %e, "Failed to count cataloged files"),
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8",
            )],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    axum::http::header::CONTENT_TYPE,
                    "text/plain; charset=utf-8",
                )],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

/// Status endpoint with catalog statistics and live scans.
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let directories = state.db.with_conn(count_directories).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to count directories");
        0
    });

    let files = state.db.with_conn(count_files).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to count files");
        0
    });
    FILES_CATALOGED.set(files);

    let active_scans = state
        .registry
        .active()
        .into_iter()
        .map(|(directory_id, state)| ActiveScan {
            directory_id,
            state,
        })
        .collect();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        directories,
        files,
        active_scans,
    })
}
