//! Error types for compression operations.

use torpor_types::CodecId;

/// Errors that can occur during compression or decompression.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input is not a valid encoding for the claimed codec.
    ///
    /// Always fatal for the chunk in question: a corrupt chunk is never
    /// partially decoded or silently repaired.
    #[error("corrupt chunk: {codec} cannot decode input: {reason}")]
    Corrupt {
        /// Codec that rejected the input.
        codec: CodecId,
        /// Decoder-reported reason.
        reason: String,
    },

    /// The compressor itself failed (allocation, internal error).
    #[error("{codec} compression failed: {reason}")]
    Compress {
        /// Codec that failed.
        codec: CodecId,
        /// Encoder-reported reason.
        reason: String,
    },
}

impl CodecError {
    /// Build a [`CodecError::Corrupt`] from any decoder error.
    pub fn corrupt(codec: CodecId, err: impl std::fmt::Display) -> Self {
        CodecError::Corrupt {
            codec,
            reason: err.to_string(),
        }
    }
}
