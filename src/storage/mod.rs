//! `SQLite` catalog storage.
//!
//! This module provides persistent storage for:
//! - Registered directories
//! - Cataloged files
//! - The bulk-deletion audit trail

mod audit;
mod catalog;
mod connection;
mod directories;
mod files;
mod models;
mod schema;

pub use audit::{get_audit_items, get_audit_log, insert_audit_log, list_audit_logs};
pub use catalog::Catalog;
pub use connection::Database;
pub use directories::{
    count_directories, delete_directory, find_directory_by_path, find_overlapping, get_directory,
    insert_directory, list_directories, register_directory,
};
pub use files::{
    apply_changeset, count_files, delete_files_by_id, get_file, get_files, insert_file,
    list_files_by_directory, query_files, FileQuery, SortColumn, SortOrder, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use models::{AuditItem, AuditLogRecord, DirectoryRecord, FileRecord, NewAuditLog, Page};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
