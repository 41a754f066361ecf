//! API key authentication middleware.
//!
//! Provides middleware for validating API key authentication on `/api` routes.
//! Supports both `Authorization: Bearer <key>` and `X-API-Key: <key>` headers.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Header naming the user on whose behalf a request acts.
pub const ACTING_USER_HEADER: &str = "x-docindex-user";

/// Acting user when the request does not name one.
pub const DEFAULT_ACTING_USER: &str = "operator";

/// API key authentication configuration.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyConfig {
    /// The expected API key. If None, authentication is disabled.
    pub key: Option<String>,
}

impl ApiKeyConfig {
    #[must_use]
    pub const fn new(key: Option<String>) -> Self {
        Self { key }
    }

    /// Check if authentication is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Validate an API key.
    #[must_use]
    pub fn validate(&self, provided_key: &str) -> bool {
        self.key
            .as_ref()
            .is_some_and(|expected| expected == provided_key)
    }
}

/// Reject requests without a valid key when a key is configured.
pub async fn require_api_key(
    State(config): State<ApiKeyConfig>,
    request: Request,
    next: Next,
) -> Response {
    if !config.is_enabled() {
        return next.run(request).await;
    }

    match extract_api_key(request.headers()) {
        Some(key) if config.validate(&key) => next.run(request).await,
        provided => {
            tracing::warn!(
                uri = %request.uri(),
                key_present = provided.is_some(),
                "Rejected unauthenticated request"
            );
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "missing or invalid API key" })),
            )
                .into_response()
        }
    }
}

/// Extract API key from request headers.
///
/// Checks both `Authorization: Bearer <key>` and `X-API-Key: <key>` headers.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    // Check Authorization header (Bearer scheme)
    if let Some(auth_header) = headers.get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(key) = auth_str.strip_prefix("Bearer ") {
                return Some(key.to_string());
            }
        }
    }

    // Check X-API-Key header
    if let Some(key_header) = headers.get("x-api-key") {
        if let Ok(key_str) = key_header.to_str() {
            return Some(key_str.to_string());
        }
    }

    None
}

/// User recorded in audit entries for this request.
#[must_use]
pub fn acting_user(headers: &HeaderMap) -> String {
    headers
        .get(ACTING_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .unwrap_or(DEFAULT_ACTING_USER)
        .to_string()
}
