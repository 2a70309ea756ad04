//! Error types for the snapshot/restore orchestrator.

use torpor_types::{Sha256Digest, SnapshotId};

use torpor_chunk::{ChunkError, ManifestError};
use torpor_codec::CodecError;
use torpor_transport::TransportError;

/// Errors that can occur during snapshot or restore operations.
///
/// Lower-layer failures bubble up unchanged; the engine adds the
/// integrity, lifecycle, and collaborator failures only it can detect.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Workspace stream could not be read.
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// The manifest is structurally invalid.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A chunk failed to compress or decompress.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A transfer operation failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No manifest exists for the requested snapshot.
    #[error("no manifest found for snapshot {snapshot_id}")]
    ManifestMissing {
        /// The requested snapshot.
        snapshot_id: SnapshotId,
    },

    /// A restored chunk's digest does not match the manifest.
    ///
    /// Always fatal: the restore is aborted rather than serving bytes
    /// that merely look plausible.
    #[error(
        "integrity violation in chunk {chunk_index}: expected {expected}, got {actual}"
    )]
    IntegrityViolation {
        /// The failing chunk.
        chunk_index: u64,
        /// Digest recorded at snapshot time.
        expected: Sha256Digest,
        /// Digest of the bytes actually restored.
        actual: Sha256Digest,
    },

    /// The reassembled artifact's digest does not match the manifest.
    #[error("artifact integrity violation: expected {expected}, got {actual}")]
    ArtifactIntegrity {
        /// Whole-artifact digest recorded at snapshot time.
        expected: Sha256Digest,
        /// Digest of the reassembled file.
        actual: Sha256Digest,
    },

    /// The operation was cancelled between chunk boundaries.
    #[error("operation cancelled")]
    Cancelled,

    /// An illegal lifecycle transition was attempted.
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        /// State the lifecycle was in.
        from: &'static str,
        /// State that was requested.
        to: &'static str,
    },

    /// A worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(String),

    /// A remote command run through the collaborator interface failed.
    #[error("remote command {command:?} exited with {exit_code}: {stderr}")]
    RemoteCommand {
        /// The command that was run.
        command: String,
        /// Its exit code.
        exit_code: i32,
        /// Captured stderr.
        stderr: String,
    },
}
