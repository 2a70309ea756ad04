//! General-purpose LZ4 block codec.

use torpor_types::CodecId;

use crate::error::CodecError;
use crate::Codec;

/// LZ4 block codec with a length-prefixed frame.
///
/// The throughput-first default for everything that is not declared
/// floating-point tensor data. Compression cannot fail: incompressible
/// input stores at a slight overhead and round-trips exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> CodecId {
        CodecId::Lz4
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::compress_prepend_size(input))
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        lz4_flex::decompress_size_prepended(input)
            .map_err(|e| CodecError::corrupt(CodecId::Lz4, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_text() {
        let data = b"fn main() { println!(\"hello\"); }\n".repeat(200);
        let compressed = Lz4Codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len(), "repetitive text must shrink");
        assert_eq!(Lz4Codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let compressed = Lz4Codec.compress(b"").unwrap();
        assert_eq!(Lz4Codec.decompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn test_incompressible_input_degrades_gracefully() {
        // Pseudo-random bytes: no patterns for LZ4 to exploit.
        let mut state: u64 = 0x243F_6A88_85A3_08D3;
        let data: Vec<u8> = (0..65536)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect();

        let compressed = Lz4Codec.compress(&data).unwrap();
        // Near-1.0 ratio is acceptable; data loss is not.
        assert!(compressed.len() <= data.len() + data.len() / 16 + 64);
        assert_eq!(Lz4Codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decompress_rejects_truncated_frame() {
        let compressed = Lz4Codec.compress(&vec![42u8; 10_000]).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        assert!(Lz4Codec.decompress(truncated).is_err());
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(Lz4Codec.decompress(&[0xFF, 0xFF, 0xFF]).is_err());
    }
}
