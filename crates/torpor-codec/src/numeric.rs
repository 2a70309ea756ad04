//! Byte-shuffle + zstd codec for floating-point tensor payloads.
//!
//! Tensor data in 16- or 32-bit float formats compresses poorly as a raw
//! byte stream: exponent and mantissa bytes interleave, so general-purpose
//! matchers find few repeats. Transposing the stream into per-byte planes
//! (all first bytes, then all second bytes, ...) groups the slowly-varying
//! exponent bytes together, where zstd's entropy stage gets real traction.
//!
//! Frame layout: one header byte carrying the shuffle element width,
//! followed by a zstd frame of the shuffled payload. A trailing remainder
//! shorter than the element width is appended unshuffled.

use torpor_types::{CodecId, ContentClass};

use crate::error::CodecError;
use crate::Codec;

/// zstd level used for tensor payloads. Higher levels gain little on
/// shuffled float data and cost real wall-clock on 64 MiB chunks.
const ZSTD_LEVEL: i32 = 3;

/// Element widths the frame header may carry.
const VALID_WIDTHS: [u8; 3] = [1, 2, 4];

/// Byte-shuffle + zstd codec.
///
/// `width` is the element size of the declared dtype (2 for f16/bf16,
/// 4 for f32) and only matters on the compress side; decompression reads
/// the width from the frame header. Width 1 disables the shuffle.
#[derive(Debug, Clone, Copy)]
pub struct NumericCodec {
    width: u8,
}

impl Default for NumericCodec {
    fn default() -> Self {
        Self { width: 2 }
    }
}

impl NumericCodec {
    /// Create a codec shuffling at the given element width.
    ///
    /// Widths outside {1, 2, 4} fall back to 1 (no shuffle) — the caller
    /// declared a dtype this codec has no plane layout for.
    pub fn new(width: u8) -> Self {
        if VALID_WIDTHS.contains(&width) {
            Self { width }
        } else {
            Self { width: 1 }
        }
    }

    /// Codec configured from a declared content class.
    pub fn for_class(class: ContentClass) -> Self {
        match class {
            ContentClass::NumericWeights(dtype) => {
                Self::new(dtype.width().unwrap_or(1) as u8)
            }
            _ => Self::new(1),
        }
    }
}

impl Codec for NumericCodec {
    fn id(&self) -> CodecId {
        CodecId::NumericZstd
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let shuffled = shuffle(input, self.width as usize);
        let body = zstd::encode_all(shuffled.as_slice(), ZSTD_LEVEL).map_err(|e| {
            CodecError::Compress {
                codec: CodecId::NumericZstd,
                reason: e.to_string(),
            }
        })?;

        let mut frame = Vec::with_capacity(1 + body.len());
        frame.push(self.width);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let Some((&width, body)) = input.split_first() else {
            return Err(CodecError::corrupt(CodecId::NumericZstd, "empty frame"));
        };
        if !VALID_WIDTHS.contains(&width) {
            return Err(CodecError::corrupt(
                CodecId::NumericZstd,
                format!("invalid element width {width}"),
            ));
        }

        let shuffled =
            zstd::decode_all(body).map_err(|e| CodecError::corrupt(CodecId::NumericZstd, e))?;
        Ok(unshuffle(&shuffled, width as usize))
    }
}

/// Transpose `input` into `width` byte planes; the sub-`width` tail is
/// appended as-is.
fn shuffle(input: &[u8], width: usize) -> Vec<u8> {
    if width <= 1 || input.len() < width {
        return input.to_vec();
    }

    let rows = input.len() / width;
    let body = rows * width;
    let mut out = Vec::with_capacity(input.len());
    for plane in 0..width {
        for row in 0..rows {
            out.push(input[row * width + plane]);
        }
    }
    out.extend_from_slice(&input[body..]);
    out
}

/// Inverse of [`shuffle`].
fn unshuffle(shuffled: &[u8], width: usize) -> Vec<u8> {
    if width <= 1 || shuffled.len() < width {
        return shuffled.to_vec();
    }

    let rows = shuffled.len() / width;
    let body = rows * width;
    let mut out = vec![0u8; shuffled.len()];
    for plane in 0..width {
        for row in 0..rows {
            out[row * width + plane] = shuffled[plane * rows + row];
        }
    }
    out[body..].copy_from_slice(&shuffled[body..]);
    out
}
