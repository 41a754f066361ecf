//! Registered directory storage operations.

use rusqlite::{params, Connection, Row};
use std::path::Path;

use super::models::{now_unix, DirectoryRecord};
use crate::error::{ScanError, StorageError};
use crate::Result;

fn row_to_directory(row: &Row<'_>) -> rusqlite::Result<DirectoryRecord> {
    Ok(DirectoryRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        created_at: row.get(2)?,
    })
}

/// Insert a directory record.
///
/// The caller is responsible for canonicalizing `path`. Registering a path
/// that equals, contains, or lies inside an existing directory is rejected,
/// so each file belongs to exactly one directory.
///
/// # Errors
///
/// Returns a conflict error on overlap, or a database error.
pub fn insert_directory(conn: &Connection, path: &str) -> Result<DirectoryRecord> {
    if let Some(existing) = find_overlapping(conn, path)? {
        return Err(StorageError::Conflict(format!(
            "'{path}' overlaps registered directory '{}'",
            existing.path
        ))
        .into());
    }

    let created_at = now_unix();
    conn.execute(
        "INSERT INTO directories (path, created_at) VALUES (?, ?)",
        params![path, created_at],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert directory: {e}")))?;

    let record = DirectoryRecord {
        id: conn.last_insert_rowid(),
        path: path.to_string(),
        created_at,
    };
    tracing::debug!(id = record.id, path = %record.path, "Inserted directory");
    Ok(record)
}

/// Validate, canonicalize and register a directory.
///
/// # Errors
///
/// Returns [`ScanError::InvalidDirectory`] if `path` is missing, not a
/// directory or not valid UTF-8, a conflict if it overlaps a registered directory, or a
/// database error.
pub fn register_directory(conn: &Connection, path: &Path) -> Result<DirectoryRecord> {
    let canonical = path
        .canonicalize()
        .map_err(|e| ScanError::invalid_directory(path.display().to_string(), e.to_string()))?;
    if !canonical.is_dir() {
        return Err(
            ScanError::invalid_directory(path.display().to_string(), "not a directory").into(),
        );
    }

    let Some(canonical) = canonical.to_str() else {
        return Err(ScanError::invalid_directory(
            path.display().to_string(),
            "path is not valid UTF-8",
        )
        .into());
    };

    let record = insert_directory(conn, canonical)?;
    tracing::info!(id = record.id, path = %record.path, "Registered directory");
    Ok(record)
}

/// Find a registered directory equal to, above, or below `path`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_overlapping(conn: &Connection, path: &str) -> Result<Option<DirectoryRecord>> {
    let candidate = Path::new(path);
    Ok(list_directories(conn)?.into_iter().find(|dir| {
        let existing = Path::new(&dir.path);
        existing.starts_with(candidate) || candidate.starts_with(existing)
    }))
}

/// Get a directory by ID.
///
/// # Errors
///
/// Returns an error if the directory is not found or the query fails.
pub fn get_directory(conn: &Connection, id: i64) -> Result<DirectoryRecord> {
    conn.query_row(
        "SELECT id, path, created_at FROM directories WHERE id = ?",
        [id],
        row_to_directory,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("directory", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get directory: {e}")).into(),
    })
}

/// Get a directory by its stored path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_directory_by_path(conn: &Connection, path: &str) -> Result<Option<DirectoryRecord>> {
    match conn.query_row(
        "SELECT id, path, created_at FROM directories WHERE path = ?",
        [path],
        row_to_directory,
    ) {
        Ok(dir) => Ok(Some(dir)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// List all registered directories ordered by ID.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_directories(conn: &Connection) -> Result<Vec<DirectoryRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, path, created_at FROM directories ORDER BY id")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let dirs = stmt
        .query_map([], row_to_directory)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(dirs)
}

/// Delete a directory and, through the cascade, all of its file rows.
///
/// Files on disk are not touched.
///
/// # Errors
///
/// Returns an error if the directory is not found or the delete fails.
pub fn delete_directory(conn: &Connection, id: i64) -> Result<()> {
    let rows = conn
        .execute("DELETE FROM directories WHERE id = ?", [id])
        .map_err(|e| StorageError::Database(e.to_string()))?;

    if rows == 0 {
        return Err(StorageError::not_found("directory", id.to_string()).into());
    }

    tracing::debug!(id, "Deleted directory");
    Ok(())
}

/// Count registered directories.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_directories(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM directories", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
