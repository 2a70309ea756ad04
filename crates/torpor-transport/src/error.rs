//! Error types for the transport layer.

use torpor_types::SnapshotId;

use torpor_store::StoreError;

/// Errors that can occur while transferring snapshot objects.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport was constructed with an empty provider list.
    #[error("no storage providers configured")]
    NoProviders,

    /// A manifest references a provider name that cannot be resolved
    /// against the configured set, even with the substring fallback.
    #[error("unknown provider {name:?}")]
    UnknownProvider {
        /// The unresolvable recorded name.
        name: String,
    },

    /// A chunk upload exhausted its retries.
    #[error("upload failed for chunk {chunk_index} to provider {provider}: {reason}")]
    UploadFailed {
        /// Index of the chunk that could not be stored.
        chunk_index: u64,
        /// Provider the upload was targeting.
        provider: String,
        /// Final attempt's error.
        reason: String,
    },

    /// A chunk could not be fetched from any recorded location.
    #[error("download failed for chunk {chunk_index}: {reason}")]
    DownloadFailed {
        /// Index of the chunk that could not be fetched.
        chunk_index: u64,
        /// Last location's error, or why no location worked.
        reason: String,
    },

    /// A manifest object already exists for this snapshot id.
    ///
    /// Concurrency conflict: two writers raced to finalize the same id.
    /// The loser must pick a new snapshot id; the existing manifest is
    /// never overwritten.
    #[error("manifest already exists for snapshot {snapshot_id}")]
    ManifestAlreadyExists {
        /// The contested snapshot id.
        snapshot_id: SnapshotId,
    },

    /// A provider was unreachable and no alternate was configured.
    #[error("provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        /// The unreachable provider.
        provider: String,
        /// Underlying connectivity error.
        reason: String,
    },

    /// Any other storage-backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
