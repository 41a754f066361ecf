//! Main application server.
//!
//! Provides the complete server application with signal handling
//! and graceful shutdown coordination.

use std::net::SocketAddr;

use axum::{middleware, Router};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::api::create_api_router;
use super::auth::{require_api_key, ApiKeyConfig};
use super::observability::spans;
use super::rest::create_rest_router;
use crate::scanner::{ScanOptions, ScanSession, SessionRegistry};
use crate::storage::{self, Database, DirectoryRecord};
use crate::Result;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Expected API key for `/api` routes
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
        }
    }
}

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: SessionRegistry,
    pub scan_options: ScanOptions,
}

impl AppState {
    #[must_use]
    pub fn new(db: Database, scan_options: ScanOptions) -> Self {
        Self {
            db,
            registry: SessionRegistry::new(),
            scan_options,
        }
    }

    /// Create a session for `directory` and take its lease.
    ///
    /// # Errors
    ///
    /// Returns a conflict if a scan of `directory` is already live.
    pub fn start_scan(&self, directory: DirectoryRecord) -> Result<ScanSession<Database>> {
        let mut session = ScanSession::new(self.db.clone(), directory, self.scan_options);
        session.start(&self.registry)?;
        Ok(session)
    }

    /// Unregister a directory while holding its lease, so no scan can
    /// start until its rows are gone.
    ///
    /// # Errors
    ///
    /// Returns a conflict if a scan of the directory is live, or not-found
    /// for an unknown ID.
    pub fn remove_directory(&self, directory_id: i64) -> Result<()> {
        let _lease = self.registry.try_acquire(directory_id)?;
        self.db
            .with_conn(|conn| storage::delete_directory(conn, directory_id))?;
        tracing::info!(directory_id, "Directory unregistered");
        Ok(())
    }

    /// Start a scan whose events are only logged.
    ///
    /// # Errors
    ///
    /// Returns a conflict if a scan of `directory` is already live.
    pub fn spawn_background_scan(&self, directory: DirectoryRecord) -> Result<()> {
        let session = self.start_scan(directory)?;
        let directory_id = session.directory().id;
        tokio::task::spawn_blocking(move || {
            if let Err(e) = session.run(|_| {}) {
                tracing::debug!(directory_id, error = %e, "Background scan ended with error");
            }
        });
        Ok(())
    }
}

/// Build the complete router.
pub fn create_router(state: AppState, auth: ApiKeyConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = create_api_router(state.clone())
        .layer(middleware::from_fn_with_state(auth, require_api_key));

    Router::new()
        .merge(create_rest_router(state))
        .merge(api)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    spans::request_span(
                        request.method().as_str(),
                        &request.uri().to_string(),
                        request_id,
                    )
                })
                .on_response(
                    |response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            status = %response.status(),
                            latency_ms = latency.as_millis(),
                            "Request completed"
                        );
                    },
                ),
        )
        .layer(cors)
}

/// Application server.
pub struct App {
    config: ServerConfig,
    state: AppState,
}

impl App {
    #[must_use]
    pub const fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    fn router(&self) -> Router {
        create_router(
            self.state.clone(),
            ApiKeyConfig::new(self.config.api_key.clone()),
        )
    }

    /// Run the server until shutdown signal.
    ///
    /// The server listens for SIGTERM (Unix) and Ctrl+C signals,
    /// then gracefully shuts down all connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or encounters
    /// a fatal error during execution.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| crate::Error::config(format!("invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            crate::error::ServerError::BindFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(%addr, "Server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::error::ServerError::Request(e.to_string()))?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
