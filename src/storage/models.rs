//! Data models for storage operations.
//!
//! This module defines the core data structures used for:
//! - Registered directories
//! - Cataloged files
//! - The deletion audit trail
//! - Paginated listings

use serde::{Deserialize, Serialize};

/// Get current Unix timestamp in seconds.
pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A registered filesystem root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Database primary key.
    pub id: i64,

    /// Canonical absolute path.
    pub path: String,

    /// Unix timestamp of registration.
    pub created_at: i64,
}

/// A catalog entry for one on-disk file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Database primary key. Changes whenever the file is reinserted.
    pub id: i64,

    /// Owning directory.
    pub directory_id: i64,

    /// Final path component.
    pub filename: String,

    /// Absolute path of the containing folder.
    pub parent_path: String,

    /// Absolute path, unique across the catalog.
    pub full_path: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Lowercase extension with a leading dot, or empty.
    pub extension: String,

    /// Last modification time in Unix milliseconds.
    pub modified_at: i64,

    /// Unix timestamp when the row was written.
    pub indexed_at: i64,
}

/// Header of a bulk-deletion audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: i64,
    pub created_at: i64,
    pub acting_user: String,
    pub action: String,
    pub file_count: i64,
}

/// One file removed by a bulk deletion, captured before removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditItem {
    pub filename: String,
    pub full_path: String,
}

impl AuditItem {
    /// Capture the identifying fields of a file record.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            full_path: record.full_path.clone(),
        }
    }
}

/// Audit entry to be written.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub acting_user: String,
    pub action: String,
}

impl NewAuditLog {
    /// Action name recorded for bulk file deletion.
    pub const BULK_DELETE: &'static str = "bulk_delete";

    /// Create a bulk-delete entry for the given user.
    #[must_use]
    pub fn bulk_delete(acting_user: impl Into<String>) -> Self {
        Self {
            acting_user: acting_user.into(),
            action: Self::BULK_DELETE.to_string(),
        }
    }
}

/// One page of a listing plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> FileRecord {
        FileRecord {
            id: 4,
            directory_id: 1,
            filename: "report.PDF".to_string(),
            parent_path: "/docs".to_string(),
            full_path: "/docs/report.PDF".to_string(),
            size_bytes: 2048,
            extension: ".pdf".to_string(),
            modified_at: 1_700_000_000_000,
            indexed_at: 1_700_000_100,
        }
    }

    #[test]
    fn test_audit_item_from_record() {
        let item = AuditItem::from_record(&sample_file());
        assert_eq!(item.filename, "report.PDF");
        assert_eq!(item.full_path, "/docs/report.PDF");
    }

    #[test]
    fn test_bulk_delete_entry() {
        let entry = NewAuditLog::bulk_delete("alice");
        assert_eq!(entry.acting_user, "alice");
        assert_eq!(entry.action, "bulk_delete");
    }

    #[test]
    fn test_file_record_serialization() {
        let json = serde_json::to_value(sample_file()).unwrap();
        assert_eq!(json["full_path"], "/docs/report.PDF");
        assert_eq!(json["size_bytes"], 2048);
        assert_eq!(json["extension"], ".pdf");
    }

    #[test]
    fn test_now_unix_is_recent() {
        assert!(now_unix() > 1_600_000_000);
    }
}
