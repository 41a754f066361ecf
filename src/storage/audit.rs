//! Deletion audit trail storage.
//!
//! Entries are append-only: nothing in the crate updates or removes them.

use rusqlite::{params, Connection, Row};

use super::models::{now_unix, AuditItem, AuditLogRecord, NewAuditLog, Page};
use crate::error::StorageError;
use crate::Result;

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<AuditLogRecord> {
    Ok(AuditLogRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        acting_user: row.get(2)?,
        action: row.get(3)?,
        file_count: row.get(4)?,
    })
}

/// Insert an audit entry and its items, returning the entry ID.
///
/// Not transactional by itself; callers wrap it together with the row
/// deletions it describes.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn insert_audit_log(conn: &Connection, entry: &NewAuditLog, items: &[AuditItem]) -> Result<i64> {
    let file_count = i64::try_from(items.len()).unwrap_or(i64::MAX);
    conn.execute(
        "INSERT INTO deletion_audit_log (created_at, acting_user, action, file_count)
         VALUES (?, ?, ?, ?)",
        params![now_unix(), entry.acting_user, entry.action, file_count],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert audit log: {e}")))?;
    let log_id = conn.last_insert_rowid();

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO deletion_audit_items (log_id, position, filename, full_path)
             VALUES (?, ?, ?, ?)",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
    for (position, item) in items.iter().enumerate() {
        let position = i64::try_from(position).unwrap_or(i64::MAX);
        stmt.execute(params![log_id, position, item.filename, item.full_path])
            .map_err(|e| StorageError::Database(format!("failed to insert audit item: {e}")))?;
    }

    tracing::trace!(log_id, files = items.len(), "Inserted audit log");
    Ok(log_id)
}

/// List audit entries, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_audit_logs(
    conn: &Connection,
    offset: usize,
    limit: usize,
) -> Result<Page<AuditLogRecord>> {
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM deletion_audit_log", [], |row| {
            row.get(0)
        })
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let mut stmt = conn
        .prepare(
            "SELECT id, created_at, acting_user, action, file_count
             FROM deletion_audit_log
             ORDER BY id DESC
             LIMIT ? OFFSET ?",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let items = stmt
        .query_map(
            params![
                i64::try_from(limit).unwrap_or(0),
                i64::try_from(offset).unwrap_or(i64::MAX)
            ],
            row_to_log,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(Page { items, total })
}

/// Get an audit entry by ID.
///
/// # Errors
///
/// Returns an error if the entry is not found or the query fails.
pub fn get_audit_log(conn: &Connection, id: i64) -> Result<AuditLogRecord> {
    conn.query_row(
        "SELECT id, created_at, acting_user, action, file_count
         FROM deletion_audit_log WHERE id = ?",
        [id],
        row_to_log,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::not_found("audit log", id.to_string()).into()
        }
        e => StorageError::Database(format!("failed to get audit log: {e}")).into(),
    })
}

/// Get the items of an audit entry in recorded order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_audit_items(conn: &Connection, log_id: i64) -> Result<Vec<AuditItem>> {
    let mut stmt = conn
        .prepare(
            "SELECT filename, full_path FROM deletion_audit_items
             WHERE log_id = ? ORDER BY position",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let items = stmt
        .query_map([log_id], |row| {
            Ok(AuditItem {
                filename: row.get(0)?,
                full_path: row.get(1)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(items)
}
