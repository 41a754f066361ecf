//! Catalog interface consumed by scanning and bulk deletion.

use std::collections::HashMap;

use super::audit;
use super::connection::Database;
use super::files;
use super::models::{AuditItem, FileRecord, NewAuditLog};
use crate::scanner::Changeset;
use crate::Result;

/// Read/write access to the persisted catalog.
///
/// `apply_changeset` must be atomic: either every insert and delete lands or
/// none does.
pub trait Catalog: Send + Sync {
    /// All files of a directory keyed by absolute path.
    fn list_files_by_directory(&self, directory_id: i64) -> Result<HashMap<String, FileRecord>>;

    /// Atomically apply a scan's changeset.
    fn apply_changeset(&self, directory_id: i64, changeset: &Changeset) -> Result<()>;

    /// Look up files by ID; unknown IDs are absent from the result.
    fn get_files(&self, ids: &[i64]) -> Result<Vec<FileRecord>>;

    /// Remove file rows, returning how many existed.
    fn delete_file_records(&self, ids: &[i64]) -> Result<usize>;

    /// Write an audit entry with its items, returning the entry ID.
    fn insert_audit_log(&self, entry: &NewAuditLog, items: &[AuditItem]) -> Result<i64>;

    /// Remove file rows and write the audit entry describing them.
    ///
    /// Implementations with transactions should make this atomic.
    fn record_deletion(
        &self,
        ids: &[i64],
        entry: &NewAuditLog,
        items: &[AuditItem],
    ) -> Result<i64> {
        self.delete_file_records(ids)?;
        self.insert_audit_log(entry, items)
    }
}

impl Catalog for Database {
    fn list_files_by_directory(&self, directory_id: i64) -> Result<HashMap<String, FileRecord>> {
        self.with_conn(|conn| files::list_files_by_directory(conn, directory_id))
    }

    fn apply_changeset(&self, directory_id: i64, changeset: &Changeset) -> Result<()> {
        self.with_transaction(|conn| files::apply_changeset(conn, directory_id, changeset))
    }

    fn get_files(&self, ids: &[i64]) -> Result<Vec<FileRecord>> {
        self.with_conn(|conn| files::get_files(conn, ids))
    }

    fn delete_file_records(&self, ids: &[i64]) -> Result<usize> {
        self.with_transaction(|conn| files::delete_files_by_id(conn, ids))
    }

    fn insert_audit_log(&self, entry: &NewAuditLog, items: &[AuditItem]) -> Result<i64> {
        self.with_transaction(|conn| audit::insert_audit_log(conn, entry, items))
    }

    fn record_deletion(
        &self,
        ids: &[i64],
        entry: &NewAuditLog,
        items: &[AuditItem],
    ) -> Result<i64> {
        self.with_transaction(|conn| {
            files::delete_files_by_id(conn, ids)?;
            audit::insert_audit_log(conn, entry, items)
        })
    }
}
