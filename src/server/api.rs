//! Catalog API: directories, scans, files and deletion history.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::app::AppState;
use super::auth::acting_user;
use super::rest::status;
use crate::deleter::{BulkDeleter, DeletionReport, REASON_NOT_FOUND};
use crate::error::{ScanError, ServerError, StorageError};
use crate::scanner::{spawn_scan, ScanState};
use crate::storage::{
    self, get_audit_items, get_audit_log, list_audit_logs, AuditItem, AuditLogRecord,
    DirectoryRecord, FileQuery, FileRecord, Page, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::{Error, Result};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.is_conflict() {
            StatusCode::CONFLICT
        } else if matches!(
            self,
            Self::Config(_)
                | Self::Scan(ScanError::InvalidDirectory { .. })
                | Self::Server(ServerError::BadRequest(_))
        ) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::BadRequest(rejection.body_text()).into()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text()).into()
    }
}

/// Registered directory with its live scan state, if any.
#[derive(Debug, Serialize)]
pub struct DirectoryView {
    #[serde(flatten)]
    pub directory: DirectoryRecord,
    pub scan_state: Option<ScanState>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDirectoryRequest {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFilesRequest {
    pub file_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub offset: usize,
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Audit entry with the files it removed.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub log: AuditLogRecord,
    pub items: Vec<AuditItem>,
}

/// Create the `/api/v1` router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route(
            "/api/v1/directories",
            get(list_directories).post(register_directory),
        )
        .route(
            "/api/v1/directories/{id}",
            get(get_directory).delete(delete_directory),
        )
        .route("/api/v1/directories/{id}/scan", post(scan_directory))
        .route("/api/v1/files", get(list_files))
        .route("/api/v1/files/delete", post(delete_files))
        .route("/api/v1/files/{id}", get(get_file).delete(delete_file))
        .route("/api/v1/history", get(list_history))
        .route("/api/v1/history/{id}", get(get_history))
        .with_state(state)
}

fn view(state: &AppState, directory: DirectoryRecord) -> DirectoryView {
    let scan_state = state.registry.state(directory.id);
    DirectoryView {
        directory,
        scan_state,
    }
}

async fn list_directories(State(state): State<AppState>) -> Result<Json<Vec<DirectoryView>>> {
    let directories = state.db.with_conn(storage::list_directories)?;
    Ok(Json(
        directories
            .into_iter()
            .map(|directory| view(&state, directory))
            .collect(),
    ))
}

/// Register a directory and kick off its initial scan.
async fn register_directory(
    State(state): State<AppState>,
    request: std::result::Result<Json<RegisterDirectoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DirectoryView>)> {
    let Json(request) = request?;
    let directory = state
        .db
        .with_conn(|conn| storage::register_directory(conn, &request.path))?;
    state.spawn_background_scan(directory.clone())?;
    Ok((StatusCode::CREATED, Json(view(&state, directory))))
}

async fn get_directory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DirectoryView>> {
    let directory = state.db.with_conn(|conn| storage::get_directory(conn, id))?;
    Ok(Json(view(&state, directory)))
}

/// Unregister a directory, dropping its file rows but not the files.
async fn delete_directory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.remove_directory(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Scan a directory, streaming progress as NDJSON.
async fn scan_directory(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let directory = state.db.with_conn(|conn| storage::get_directory(conn, id))?;
    let session = state.start_scan(directory)?;

    let lines =
        spawn_scan(session).map(|event| Ok::<_, Infallible>(Bytes::from(event.to_ndjson())));

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response())
}

async fn list_files(
    State(state): State<AppState>,
    query: std::result::Result<Query<FileQuery>, QueryRejection>,
) -> Result<Json<Page<FileRecord>>> {
    let Query(query) = query?;
    let page = state
        .db
        .with_conn(|conn| storage::query_files(conn, &query))?;
    Ok(Json(page))
}

async fn get_file(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<FileRecord>> {
    let file = state.db.with_conn(|conn| storage::get_file(conn, id))?;
    Ok(Json(file))
}

async fn delete_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: std::result::Result<Json<DeleteFilesRequest>, JsonRejection>,
) -> Result<Json<DeletionReport>> {
    let Json(request) = request?;
    let report = run_deletion(&state, request.file_ids, acting_user(&headers)).await?;
    Ok(Json(report))
}

/// Delete a single file; an unknown ID is a 404 rather than a failure entry.
async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<DeletionReport>> {
    let report = run_deletion(&state, vec![id], acting_user(&headers)).await?;
    if report
        .failures
        .iter()
        .any(|failure| failure.reason == REASON_NOT_FOUND)
    {
        return Err(StorageError::not_found("file", id.to_string()).into());
    }
    Ok(Json(report))
}

async fn run_deletion(
    state: &AppState,
    file_ids: Vec<i64>,
    user: String,
) -> Result<DeletionReport> {
    let deleter = BulkDeleter::new(state.db.clone(), state.registry.clone());
    tokio::task::spawn_blocking(move || deleter.delete_files(&file_ids, &user))
        .await
        .map_err(|e| Error::internal(format!("deletion task failed: {e}")))?
}

async fn list_history(
    State(state): State<AppState>,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Page<AuditLogRecord>>> {
    let Query(query) = query?;
    let page = state
        .db
        .with_conn(|conn| list_audit_logs(conn, query.offset, query.limit.min(MAX_PAGE_SIZE)))?;
    Ok(Json(page))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<HistoryEntry>> {
    let entry = state.db.with_conn(|conn| {
        Ok(HistoryEntry {
            log: get_audit_log(conn, id)?,
            items: get_audit_items(conn, id)?,
        })
    })?;
    Ok(Json(entry))
}
