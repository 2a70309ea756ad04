//! Chunk and whole-artifact integrity verification.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use torpor_types::{ChunkEntry, Sha256Digest};

use crate::error::EngineError;

/// Verify a restored chunk's bytes against the digest recorded at
/// snapshot time.
pub fn verify_chunk(entry: &ChunkEntry, data: &[u8]) -> Result<(), EngineError> {
    let actual = Sha256Digest::from_data(data);
    if actual != entry.sha256 {
        return Err(EngineError::IntegrityViolation {
            chunk_index: entry.index,
            expected: entry.sha256,
            actual,
        });
    }
    Ok(())
}

/// Compute the SHA-256 of a file by streaming it in 1 MiB reads.
pub async fn hash_file(path: &Path) -> Result<Sha256Digest, EngineError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest: [u8; 32] = hasher.finalize().into();
    Ok(Sha256Digest::from(digest))
}

/// Verify a reassembled artifact against the snapshot-time digest.
pub fn verify_artifact(expected: Sha256Digest, actual: Sha256Digest) -> Result<(), EngineError> {
    if actual != expected {
        return Err(EngineError::ArtifactIntegrity { expected, actual });
    }
    Ok(())
}
