//! Snapshot and restore lifecycle state machines.
//!
//! Transitions are one-directional and terminal states are final: a
//! failed snapshot or restore is never resumed in place. Callers retry by
//! issuing a fresh operation under a new snapshot id (or the same target
//! path for restores).

use tracing::debug;

use crate::error::EngineError;

/// States a snapshot operation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Operation registered, nothing read yet.
    Created,
    /// Workspace is being chunked and compressed.
    Compressing,
    /// All chunks dispatched; uploads draining.
    Uploading,
    /// Manifest published. Terminal.
    Completed,
    /// Aborted with an error. Terminal.
    Failed,
}

impl SnapshotState {
    /// Lowercase state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SnapshotState::Created => "created",
            SnapshotState::Compressing => "compressing",
            SnapshotState::Uploading => "uploading",
            SnapshotState::Completed => "completed",
            SnapshotState::Failed => "failed",
        }
    }

    fn can_advance_to(self, next: SnapshotState) -> bool {
        use SnapshotState::*;
        matches!(
            (self, next),
            (Created, Compressing)
                | (Compressing, Uploading)
                | (Uploading, Completed)
                | (Created, Failed)
                | (Compressing, Failed)
                | (Uploading, Failed)
        )
    }
}

/// States a restore operation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    /// Operation registered.
    Requested,
    /// Manifest fetched; chunk downloads in flight.
    Downloading,
    /// Downloads complete; decompression and chunk verification draining.
    Decompressing,
    /// Whole-artifact verification running.
    Verifying,
    /// Workspace reassembled and verified. Terminal.
    Restored,
    /// Aborted with an error. Terminal.
    Failed,
}

impl RestoreState {
    /// Lowercase state name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RestoreState::Requested => "requested",
            RestoreState::Downloading => "downloading",
            RestoreState::Decompressing => "decompressing",
            RestoreState::Verifying => "verifying",
            RestoreState::Restored => "restored",
            RestoreState::Failed => "failed",
        }
    }

    fn can_advance_to(self, next: RestoreState) -> bool {
        use RestoreState::*;
        match (self, next) {
            (Requested, Downloading)
            | (Downloading, Decompressing)
            | (Decompressing, Verifying)
            | (Verifying, Restored) => true,
            (from, Failed) => !matches!(from, Restored | Failed),
            _ => false,
        }
    }
}

/// Tracks a snapshot operation's state, rejecting illegal transitions.
#[derive(Debug)]
pub struct SnapshotLifecycle {
    state: SnapshotState,
}

impl SnapshotLifecycle {
    /// Start in [`SnapshotState::Created`].
    pub fn new() -> Self {
        Self {
            state: SnapshotState::Created,
        }
    }

    /// Current state.
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Move to `next`, or fail if the transition is not in the table.
    pub fn advance(&mut self, next: SnapshotState) -> Result<(), EngineError> {
        if !self.state.can_advance_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        debug!(from = self.state.name(), to = next.name(), "snapshot state");
        self.state = next;
        Ok(())
    }

    /// Record failure. Idempotent on an already-failed lifecycle; illegal
    /// only after `Completed`.
    pub fn fail(&mut self) {
        if self.state != SnapshotState::Completed && self.state != SnapshotState::Failed {
            debug!(from = self.state.name(), to = "failed", "snapshot state");
            self.state = SnapshotState::Failed;
        }
    }
}

impl Default for SnapshotLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks a restore operation's state, rejecting illegal transitions.
#[derive(Debug)]
pub struct RestoreLifecycle {
    state: RestoreState,
}

impl RestoreLifecycle {
    /// Start in [`RestoreState::Requested`].
    pub fn new() -> Self {
        Self {
            state: RestoreState::Requested,
        }
    }

    /// Current state.
    pub fn state(&self) -> RestoreState {
        self.state
    }

    /// Move to `next`, or fail if the transition is not in the table.
    pub fn advance(&mut self, next: RestoreState) -> Result<(), EngineError> {
        if !self.state.can_advance_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        debug!(from = self.state.name(), to = next.name(), "restore state");
        self.state = next;
        Ok(())
    }

    /// Record failure. Illegal only after `Restored`.
    pub fn fail(&mut self) {
        if self.state != RestoreState::Restored && self.state != RestoreState::Failed {
            debug!(from = self.state.name(), to = "failed", "restore state");
            self.state = RestoreState::Failed;
        }
    }
}

impl Default for RestoreLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
