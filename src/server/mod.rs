//! HTTP server.
//!
//! This module provides:
//! - The catalog REST API using axum, with NDJSON scan streams
//! - Health, status and Prometheus metrics endpoints
//! - Optional API key authentication
//! - Tracing setup and shared span constructors

mod api;
mod app;
mod auth;
pub mod metrics;
mod observability;
mod rest;

pub use api::{
    create_api_router, DeleteFilesRequest, DirectoryView, HistoryEntry, HistoryQuery,
    RegisterDirectoryRequest,
};
pub use app::{create_router, App, AppState, ServerConfig};
pub use auth::{acting_user, ApiKeyConfig, ACTING_USER_HEADER, DEFAULT_ACTING_USER};
pub use metrics::init_metrics;
pub use observability::{init_tracing, spans};
pub use rest::{create_rest_router, ActiveScan, HealthResponse, StatusResponse};
