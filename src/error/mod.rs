//! Error types and Result aliases for docindex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using docindex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docindex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Directory scanning error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Server/API error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Write rejected because it conflicts with existing catalog state.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Scan errors.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Another session holds the lease for this directory.
    #[error("scan already in progress for directory {directory_id}")]
    AlreadyRunning { directory_id: i64 },

    /// Path does not exist or is not a directory.
    #[error("invalid directory '{path}': {reason}")]
    InvalidDirectory { path: String, reason: String },

    /// Ignore file exists but could not be read.
    #[error("failed to read ignore file '{path}': {reason}")]
    IgnoreFile { path: String, reason: String },

    /// Traversal failed at the scan root.
    #[error("failed to walk '{path}': {reason}")]
    Walk { path: String, reason: String },

    /// Applying the changeset failed; nothing was committed.
    #[error("commit failed: {0}")]
    Commit(String),
}

/// Server/API errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Request handling error.
    #[error("request error: {0}")]
    Request(String),

    /// Request parameters or body could not be decoded.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error reports a record that does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }

    /// Whether this error reports a conflict with live state.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::Conflict(_))
                | Self::Scan(ScanError::AlreadyRunning { .. })
        )
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl ScanError {
    /// Create an invalid-directory error.
    pub fn invalid_directory(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
