//! Error types for object storage backends.

/// Errors that can occur during object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend endpoint could not be reached (connect/timeout).
    ///
    /// The transport layer treats this as the provider being unavailable
    /// and falls back to alternate providers where configured.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// A requested byte range lies outside the object.
    #[error("invalid range for {key}: offset {offset} length {length}")]
    InvalidRange {
        /// Object key.
        key: String,
        /// Requested start offset.
        offset: u64,
        /// Requested length.
        length: u64,
    },

    /// Any other backend-reported failure.
    #[error("backend error: {0}")]
    Backend(String),
}
