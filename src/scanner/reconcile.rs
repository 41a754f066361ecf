//! Two-sided diff between a walk and the stored catalog.

use std::collections::HashMap;

use super::walker::FileDescriptor;
use crate::storage::FileRecord;

/// Rows to add and remove for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    pub to_insert: Vec<FileDescriptor>,
    pub to_delete: Vec<i64>,
}

impl Changeset {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }
}

/// Outcome for a single observed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Same size and modification time as the stored row.
    Unchanged,
    /// Not in the catalog.
    New,
    /// Stored row is stale; it is deleted and the file reinserted.
    Modified,
}

/// Incremental reconciler fed one descriptor at a time.
///
/// Every stored row still in the index when [`finish`](Self::finish) is
/// called was not seen on disk and is scheduled for deletion.
#[derive(Debug)]
pub struct Reconciler {
    index: HashMap<String, FileRecord>,
    changeset: Changeset,
    observed: u64,
}

impl Reconciler {
    /// Start from the catalog's current rows for one directory.
    #[must_use]
    pub fn new(index: HashMap<String, FileRecord>) -> Self {
        Self {
            index,
            changeset: Changeset::default(),
            observed: 0,
        }
    }

    /// Record one file from the walk.
    pub fn observe(&mut self, file: FileDescriptor) -> Decision {
        self.observed += 1;

        let decision = match self.index.remove(&file.full_path()) {
            Some(stored) if is_current(&stored, &file) => Decision::Unchanged,
            Some(stored) => {
                self.changeset.to_delete.push(stored.id);
                Decision::Modified
            }
            None => Decision::New,
        };

        tracing::trace!(path = %file.absolute_path.display(), ?decision, "Reconciled");
        if decision != Decision::Unchanged {
            self.changeset.to_insert.push(file);
        }
        decision
    }

    /// Files observed so far.
    #[must_use]
    pub const fn observed(&self) -> u64 {
        self.observed
    }

    /// Close the walk and produce the changeset.
    #[must_use]
    pub fn finish(mut self) -> Changeset {
        let mut unseen: Vec<i64> = self.index.into_values().map(|record| record.id).collect();
        unseen.sort_unstable();
        self.changeset.to_delete.extend(unseen);
        self.changeset
    }
}

fn is_current(stored: &FileRecord, file: &FileDescriptor) -> bool {
    u64::try_from(stored.size_bytes).is_ok_and(|size| size == file.size_bytes)
        && stored.modified_at == file.modified_at
}

/// Reconcile a complete walk against `index`.
pub fn reconcile(
    walk: impl IntoIterator<Item = FileDescriptor>,
    index: HashMap<String, FileRecord>,
) -> Changeset {
    let mut reconciler = Reconciler::new(index);
    for file in walk {
        reconciler.observe(file);
    }
    reconciler.finish()
}
