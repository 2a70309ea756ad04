//! Error types for chunking and manifest handling.

/// Errors that can occur while reading a workspace stream into chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The underlying byte source could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural failures when parsing or validating a persisted manifest.
///
/// Any of these means the manifest must not be interpreted at all; the
/// caller aborts before transferring a single chunk.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest is not valid JSON or is missing required fields.
    #[error("invalid manifest: {0}")]
    Malformed(String),

    /// Two chunk entries share the same index.
    #[error("invalid manifest: duplicate chunk index {index}")]
    DuplicateIndex {
        /// The repeated index.
        index: u64,
    },

    /// Chunk indices are not contiguous from 0.
    #[error("invalid manifest: expected chunk index {expected}, found {found}")]
    NonContiguousIndex {
        /// The index required at this position.
        expected: u64,
        /// The index actually present.
        found: u64,
    },

    /// A declared total does not match the sum of per-chunk fields.
    #[error("invalid manifest: {field} is {declared} but chunks sum to {summed}")]
    TotalMismatch {
        /// Which total field disagrees.
        field: &'static str,
        /// Value declared in the manifest.
        declared: u64,
        /// Value recomputed from the chunk list.
        summed: u64,
    },

    /// `num_chunks` does not match the length of the chunk list.
    #[error("invalid manifest: num_chunks is {declared} but {found} chunks are listed")]
    ChunkCountMismatch {
        /// Declared chunk count.
        declared: u64,
        /// Number of entries actually present.
        found: u64,
    },

    /// The completion checksum over the chunk list does not verify.
    #[error("invalid manifest: chunk list checksum mismatch")]
    ChunkListChecksum,

    /// The manifest references a strategy this build does not know.
    #[error("invalid manifest: unknown strategy {name:?}")]
    UnknownStrategy {
        /// The unrecognized `name-vN` identifier.
        name: String,
    },

    /// A chunk entry references a chunk with no recorded storage location.
    #[error("invalid manifest: chunk {index} has no storage location")]
    MissingLocation {
        /// The chunk without a provider.
        index: u64,
    },
}
