//! Bulk deletion of cataloged files.
//!
//! Removes files from disk, drops their catalog rows and records an audit
//! entry for the ones that succeeded. Per-file failures never abort the
//! batch.

mod bulk;

pub use bulk::{
    BulkDeleter, DeleteFailure, DeletionReport, REASON_CATALOG_UPDATE_FAILED, REASON_NOT_FOUND,
    REASON_SCAN_IN_PROGRESS,
};
