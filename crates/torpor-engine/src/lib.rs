//! Snapshot/restore orchestration for torpor.
//!
//! The [`SnapshotEngine`] sequences the full pipeline — chunk → compress
//! → upload → manifest on the way out; manifest → download → decompress →
//! verify → reassemble on the way back — over bounded worker pools, with
//! one-directional lifecycle state machines and cooperative cancellation
//! at chunk boundaries.

mod engine;
mod error;
mod lifecycle;
mod verify;
mod workspace;

pub use engine::{
    CancelFlag, EngineConfig, RestoreHandle, SnapshotEngine, SnapshotHandle, SnapshotRequest,
};
pub use error::EngineError;
pub use lifecycle::{RestoreLifecycle, RestoreState, SnapshotLifecycle, SnapshotState};
pub use verify::{hash_file, verify_artifact, verify_chunk};
pub use workspace::{
    cleanup_remote_archive, remote_workspace_size, CommandOutput, RemoteExec, RemoteWorkspace,
    WorkspaceRef,
};
