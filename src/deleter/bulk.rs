//! Disk-then-catalog deletion with per-file reporting.
//!
//! Files are removed from disk first. The catalog rows and the audit entry
//! are then written in one step, covering only the files that are gone.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;

use serde::Serialize;

use crate::scanner::SessionRegistry;
use crate::server::{metrics, spans};
use crate::storage::{AuditItem, Catalog, FileRecord, NewAuditLog};
use crate::Result;

/// Failure reason for an ID with no catalog row.
pub const REASON_NOT_FOUND: &str = "not found in catalog";

/// Failure reason for a file whose directory is being scanned.
pub const REASON_SCAN_IN_PROGRESS: &str = "scan in progress";

/// Failure reason for a file removed from disk whose catalog row survived.
pub const REASON_CATALOG_UPDATE_FAILED: &str = "removed from disk, catalog update failed";

/// Why one requested file was not deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub file_id: i64,
    pub reason: String,
}

/// Outcome of a bulk deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub deleted_count: usize,
    pub failures: Vec<DeleteFailure>,
    /// Audit entry written for this batch; absent when nothing was deleted.
    pub audit_log_id: Option<i64>,
}

/// Deletes cataloged files from disk and catalog.
pub struct BulkDeleter<C> {
    catalog: C,
    registry: SessionRegistry,
}

impl<C: Catalog> BulkDeleter<C> {
    pub const fn new(catalog: C, registry: SessionRegistry) -> Self {
        Self { catalog, registry }
    }

    /// Delete `file_ids` on behalf of `acting_user`.
    ///
    /// Duplicate IDs are processed once. A file already gone from disk
    /// counts as deleted. Files whose directory has a live scan are left
    /// alone and reported as failures.
    ///
    /// # Errors
    ///
    /// Returns an error only if the catalog cannot be read. Per-file problems,
    /// including a failed row removal after the files left the disk, are
    /// reported in [`DeletionReport::failures`].
    pub fn delete_files(&self, file_ids: &[i64], acting_user: &str) -> Result<DeletionReport> {
        let span = spans::bulk_delete_span(acting_user, file_ids.len());
        let _guard = span.enter();

        let mut seen = HashSet::with_capacity(file_ids.len());
        let ids: Vec<i64> = file_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut records: HashMap<i64, FileRecord> = self
            .catalog
            .get_files(&ids)?
            .into_iter()
            .map(|record| (record.id, record))
            .collect();

        let mut report = DeletionReport::default();
        let mut deleted = Vec::new();

        for id in ids {
            let Some(record) = records.remove(&id) else {
                report.failures.push(DeleteFailure {
                    file_id: id,
                    reason: REASON_NOT_FOUND.to_string(),
                });
                continue;
            };

            if self.registry.is_active(record.directory_id) {
                tracing::debug!(
                    file_id = id,
                    directory_id = record.directory_id,
                    "Skipping file under live scan"
                );
                report.failures.push(DeleteFailure {
                    file_id: id,
                    reason: REASON_SCAN_IN_PROGRESS.to_string(),
                });
                continue;
            }

            match remove_from_disk(&record) {
                Ok(()) => deleted.push(record),
                Err(reason) => {
                    tracing::warn!(
                        file_id = id,
                        path = %record.full_path,
                        %reason,
                        "Failed to delete file"
                    );
                    report.failures.push(DeleteFailure { file_id: id, reason });
                }
            }
        }

        if deleted.is_empty() {
            tracing::info!(failed = report.failures.len(), "Bulk delete removed nothing");
            return Ok(report);
        }

        let deleted_ids: Vec<i64> = deleted.iter().map(|r| r.id).collect();
        let items: Vec<AuditItem> = deleted.iter().map(AuditItem::from_record).collect();
        let audit_log_id = match self.catalog.record_deletion(
            &deleted_ids,
            &NewAuditLog::bulk_delete(acting_user),
            &items,
        ) {
            Ok(id) => id,
            Err(e) => {
                for record in &deleted {
                    tracing::error!(
                        file_id = record.id,
                        path = %record.full_path,
                        error = %e,
                        "File removed from disk but its catalog row remains"
                    );
                    report.failures.push(DeleteFailure {
                        file_id: record.id,
                        reason: REASON_CATALOG_UPDATE_FAILED.to_string(),
                    });
                }
                return Ok(report);
            }
        };
        report.deleted_count = deleted.len();
        report.audit_log_id = Some(audit_log_id);

        metrics::FILES_DELETED.inc_by(deleted.len() as u64);
        tracing::info!(
            deleted = report.deleted_count,
            failed = report.failures.len(),
            audit_log_id,
            "Bulk delete complete"
        );
        Ok(report)
    }
}

/// Remove one file; a file that is already gone counts as removed.
fn remove_from_disk(record: &FileRecord) -> std::result::Result<(), String> {
    match std::fs::remove_file(&record.full_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %record.full_path, "File already absent from disk");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}
