//! Stale-snapshot suppression for live queries.
//!
//! Each registration remembers the newest commit it has delivered; any
//! snapshot that does not move past it is dropped, so a later delivery never
//! reflects an earlier logical state than one already delivered.

/// Tracks the newest commit delivered to one subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSequencer {
    last_commit: Option<u64>,
}

impl SnapshotSequencer {
    /// Create a sequencer that has delivered nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `commit` if it is newer than everything delivered so far.
    ///
    /// Returns `false` for duplicate or out-of-order snapshots.
    pub fn admit(&mut self, commit: u64) -> bool {
        match self.last_commit {
            Some(last) if commit <= last => false,
            _ => {
                self.last_commit = Some(commit);
                true
            }
        }
    }

    /// Newest commit delivered, if any.
    pub fn last_commit(&self) -> Option<u64> {
        self.last_commit
    }
}
