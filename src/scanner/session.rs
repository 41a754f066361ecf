//! One end-to-end scan of a registered directory.
//!
//! A session moves `Idle → Running → Committing → Completed`, or to
//! `Failed` from `Running`/`Committing`. It always ends with exactly one
//! terminal event: `complete` or `error`. The catalog is written once, in a
//! single transaction, after the walk is exhausted.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::reconcile::{Changeset, Reconciler};
use super::registry::{ScanLease, ScanState, SessionRegistry};
use super::walker::{walk, WalkOptions, WalkStats};
use crate::error::ScanError;
use crate::server::{metrics, spans};
use crate::storage::{Catalog, DirectoryRecord};
use crate::{Error, Result};

/// Capacity of the event channel between the walk thread and the consumer.
const EVENT_BUFFER: usize = 256;

/// Streamed scan progress. Serialized as one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Progress {
        count: u64,
        file: String,
    },
    Complete {
        total_scanned: u64,
        added: u64,
        deleted: u64,
    },
    Error {
        message: String,
    },
}

impl ScanEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    /// Newline-terminated JSON line.
    #[must_use]
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"failed to encode event: {e}"}}"#)
        });
        line.push('\n');
        line
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub directory_id: i64,
    pub total_scanned: u64,
    pub added: u64,
    pub deleted: u64,
    pub walk: WalkStats,
}

/// Per-scan tuning.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Emit a progress event every this many files.
    pub progress_interval: usize,
    pub walk: WalkOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            progress_interval: 1,
            walk: WalkOptions::default(),
        }
    }
}

/// A single scan of one directory.
pub struct ScanSession<C> {
    catalog: C,
    directory: DirectoryRecord,
    options: ScanOptions,
    state: ScanState,
    lease: Option<ScanLease>,
}

impl<C: Catalog> ScanSession<C> {
    /// Create an idle session.
    pub fn new(catalog: C, directory: DirectoryRecord, options: ScanOptions) -> Self {
        Self {
            catalog,
            directory,
            options,
            state: ScanState::Idle,
            lease: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    #[must_use]
    pub const fn directory(&self) -> &DirectoryRecord {
        &self.directory
    }

    /// Take the directory's lease and move to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::AlreadyRunning`] if another session for the same
    /// directory is live, leaving this session idle.
    pub fn start(&mut self, registry: &SessionRegistry) -> Result<()> {
        if self.state != ScanState::Idle {
            return Err(Error::internal(format!(
                "cannot start scan session in state {:?}",
                self.state
            )));
        }
        self.lease = Some(registry.try_acquire(self.directory.id)?);
        self.transition(ScanState::Running);
        Ok(())
    }

    /// Drive the session to a terminal state, handing every event to `emit`.
    ///
    /// Blocks on filesystem and database I/O.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the session to `Failed`; an `error`
    /// event carrying the same message has already been emitted.
    pub fn run<F>(mut self, mut emit: F) -> Result<ScanSummary>
    where
        F: FnMut(ScanEvent),
    {
        if self.state != ScanState::Running {
            return Err(Error::internal("scan session was not started"));
        }

        let span = spans::scan_span(self.directory.id, &self.directory.path);
        let _guard = span.enter();
        let started = Instant::now();
        metrics::ACTIVE_SCANS.inc();

        let result = self.execute(&mut emit);
        metrics::ACTIVE_SCANS.dec();
        metrics::SCAN_DURATION.observe(started.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                self.transition(ScanState::Completed);
                metrics::SCANS_TOTAL.with_label_values(&["completed"]).inc();
                tracing::info!(
                    scanned = summary.total_scanned,
                    added = summary.added,
                    deleted = summary.deleted,
                    ignored = summary.walk.ignored,
                    skipped = summary.walk.skipped,
                    "Scan complete"
                );
                emit(ScanEvent::Complete {
                    total_scanned: summary.total_scanned,
                    added: summary.added,
                    deleted: summary.deleted,
                });
                Ok(summary)
            }
            Err(e) => {
                self.transition(ScanState::Failed);
                metrics::SCANS_TOTAL.with_label_values(&["failed"]).inc();
                tracing::error!(error = %e, "Scan failed");
                emit(ScanEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
        // `self` drops here, releasing the lease.
    }

    fn execute(&mut self, emit: &mut dyn FnMut(ScanEvent)) -> Result<ScanSummary> {
        let root = Path::new(&self.directory.path);
        let index = self.catalog.list_files_by_directory(self.directory.id)?;
        tracing::debug!(existing = index.len(), "Loaded catalog index");

        let mut walker = walk(root, self.options.walk)?;
        let mut reconciler = Reconciler::new(index);
        let interval = self.options.progress_interval.max(1) as u64;

        for item in walker.by_ref() {
            let file = item?;
            let count = reconciler.observed() + 1;
            if count % interval == 0 {
                emit(ScanEvent::Progress {
                    count,
                    file: file.full_path(),
                });
            }
            reconciler.observe(file);
        }

        let total_scanned = reconciler.observed();
        metrics::FILES_SCANNED.inc_by(total_scanned);
        let changeset = reconciler.finish();
        self.commit(&changeset)?;

        Ok(ScanSummary {
            directory_id: self.directory.id,
            total_scanned,
            added: changeset.to_insert.len() as u64,
            deleted: changeset.to_delete.len() as u64,
            walk: walker.stats(),
        })
    }

    fn commit(&mut self, changeset: &Changeset) -> Result<()> {
        self.transition(ScanState::Committing);
        if changeset.is_empty() {
            return Ok(());
        }
        self.catalog
            .apply_changeset(self.directory.id, changeset)
            .map_err(|e| ScanError::Commit(e.to_string()).into())
    }

    fn transition(&mut self, next: ScanState) {
        tracing::debug!(from = ?self.state, to = ?next, "Scan state transition");
        self.state = next;
        if let Some(lease) = &self.lease {
            lease.set_state(next);
        }
    }
}

/// Run a started session on a blocking thread and stream its events.
///
/// The session keeps running if the stream is dropped early.
pub fn spawn_scan<C>(session: ScanSession<C>) -> ReceiverStream<ScanEvent>
where
    C: Catalog + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let directory_id = session.directory().id;

    tokio::task::spawn_blocking(move || {
        let mut receiver_gone = false;
        let result = session.run(|event| {
            if !receiver_gone && tx.blocking_send(event).is_err() {
                receiver_gone = true;
                tracing::debug!(directory_id, "Event receiver dropped, scan continues");
            }
        });
        if let Err(e) = result {
            tracing::debug!(directory_id, error = %e, "Streamed scan ended with error");
        }
    });

    ReceiverStream::new(rx)
}
