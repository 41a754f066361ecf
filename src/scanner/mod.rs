//! Directory scanning.
//!
//! This module provides:
//! - Ignore-file matching (`.docignore`)
//! - A lazy, pruning directory walker
//! - Reconciliation of a walk against the stored catalog
//! - Scan sessions with streamed progress and a single atomic commit
//! - The per-directory registry that keeps scans exclusive

mod matcher;
mod reconcile;
mod registry;
mod session;
mod walker;

pub use matcher::{ignore_file_path, IgnoreMatcher, IGNORE_FILE_NAME};
pub use reconcile::{reconcile, Changeset, Decision, Reconciler};
pub use registry::{ScanLease, ScanState, SessionRegistry};
pub use session::{spawn_scan, ScanEvent, ScanOptions, ScanSession, ScanSummary};
pub use walker::{walk, FileDescriptor, WalkOptions, WalkStats, Walker};
