//! Per-directory scan leases.
//!
//! At most one session per directory may be running or committing. A
//! session takes a [`ScanLease`] when it starts; the lease is released when
//! it is dropped, whichever way the session ends.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ScanError;
use crate::Result;

/// Lifecycle of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Running,
    Committing,
    Completed,
    Failed,
}

impl ScanState {
    /// Whether a session in this state holds its directory's lease.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Committing)
    }
}

/// Shared map of live sessions keyed by directory ID.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    live: Arc<Mutex<HashMap<i64, ScanState>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `directory_id`, marking it running.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::AlreadyRunning`] if another session holds it.
    pub fn try_acquire(&self, directory_id: i64) -> Result<ScanLease> {
        let mut live = self.live.lock();
        if live.contains_key(&directory_id) {
            return Err(ScanError::AlreadyRunning { directory_id }.into());
        }
        live.insert(directory_id, ScanState::Running);
        drop(live);

        tracing::debug!(directory_id, "Scan lease acquired");
        Ok(ScanLease {
            registry: self.clone(),
            directory_id,
        })
    }

    /// Whether a session for `directory_id` is running or committing.
    #[must_use]
    pub fn is_active(&self, directory_id: i64) -> bool {
        self.live.lock().contains_key(&directory_id)
    }

    /// State of the live session for `directory_id`, if any.
    #[must_use]
    pub fn state(&self, directory_id: i64) -> Option<ScanState> {
        self.live.lock().get(&directory_id).copied()
    }

    /// Snapshot of all live sessions, sorted by directory ID.
    #[must_use]
    pub fn active(&self) -> Vec<(i64, ScanState)> {
        let mut active: Vec<_> = self.live.lock().iter().map(|(k, v)| (*k, *v)).collect();
        active.sort_unstable_by_key(|(id, _)| *id);
        active
    }
}

/// Exclusive right to scan one directory.
#[derive(Debug)]
pub struct ScanLease {
    registry: SessionRegistry,
    directory_id: i64,
}

impl ScanLease {
    #[must_use]
    pub const fn directory_id(&self) -> i64 {
        self.directory_id
    }

    /// Publish a state change of the owning session.
    pub fn set_state(&self, state: ScanState) {
        if let Some(slot) = self.registry.live.lock().get_mut(&self.directory_id) {
            *slot = state;
        }
    }
}

impl Drop for ScanLease {
    fn drop(&mut self) {
        self.registry.live.lock().remove(&self.directory_id);
        tracing::debug!(directory_id = self.directory_id, "Scan lease released");
    }
}
