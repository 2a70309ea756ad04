//! Compression codecs and codec selection for torpor snapshots.
//!
//! Two codecs are published:
//! - [`Lz4Codec`] — general-purpose block compression, throughput-first.
//! - [`NumericCodec`] — byte-shuffle + zstd for floating-point tensor
//!   payloads, ratio-first.
//!
//! Both satisfy `decompress(compress(x)) == x` for every byte sequence
//! (property-tested in `tests/proptest_roundtrip.rs`), never panic on
//! incompressible input, and fail with [`CodecError::Corrupt`] instead of
//! returning truncated or garbage output.
//!
//! [`select_codec`] is the pure content-class → codec mapping; it has no
//! side effects and is deterministic for identical inputs.

mod error;
mod lz4;
mod numeric;
mod select;

pub use error::CodecError;
pub use lz4::Lz4Codec;
pub use numeric::NumericCodec;
pub use select::select_codec;

use torpor_types::{CodecId, ContentClass};

/// A compression codec.
///
/// Implementations must be stateless and `Send + Sync`: the engine shares
/// one codec instance across all compression workers.
pub trait Codec: Send + Sync {
    /// Which codec this is, as recorded in the manifest.
    fn id(&self) -> CodecId;

    /// Compress a chunk. Must succeed for arbitrary input; incompressible
    /// data degrades to a near-1.0 ratio, never to an error or data loss.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress a chunk. Fails with [`CodecError::Corrupt`] if the input
    /// is not a valid encoding for this codec.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Compress `data` with the given codec, using the element width implied
/// by the declared content class for the numeric codec.
pub fn compress(id: CodecId, class: ContentClass, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match id {
        CodecId::Lz4 => Lz4Codec.compress(data),
        CodecId::NumericZstd => NumericCodec::for_class(class).compress(data),
    }
}

/// Decompress `data` previously compressed with the given codec.
///
/// The numeric codec carries its element width in the frame, so no
/// content-class context is needed on this side.
pub fn decompress(id: CodecId, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match id {
        CodecId::Lz4 => Lz4Codec.decompress(data),
        CodecId::NumericZstd => NumericCodec::default().decompress(data),
    }
}
