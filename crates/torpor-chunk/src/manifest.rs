//! Manifest building, JSON persistence, and structural validation.
//!
//! A manifest is finalized once, after every chunk of its snapshot has
//! been compressed and uploaded, and is immutable from then on. The
//! reader side refuses to interpret a manifest with any structural
//! defect — a snapshot with a broken manifest is unusable by definition,
//! however many chunk objects exist.

use torpor_types::{ChunkEntry, Manifest, Sha256Digest, SnapshotId, Strategy};

use crate::error::ManifestError;

/// Accumulates chunk metadata while a snapshot is being written.
///
/// Chunks may be added in any completion order; [`finalize`] sorts by
/// index and validates contiguity, so a pipeline that lost a chunk (for
/// example to cancellation) cannot produce a finalized manifest.
///
/// Totals are computed as the sum of per-chunk fields, never measured
/// independently.
///
/// [`finalize`]: ManifestBuilder::finalize
pub struct ManifestBuilder {
    snapshot_id: SnapshotId,
    strategy: Strategy,
    entries: Vec<ChunkEntry>,
}

impl ManifestBuilder {
    /// Start a manifest for the given snapshot and strategy.
    pub fn new(snapshot_id: SnapshotId, strategy: Strategy) -> Self {
        Self {
            snapshot_id,
            strategy,
            entries: Vec::new(),
        }
    }

    /// Record one completed chunk. Order does not matter.
    pub fn add_chunk(&mut self, entry: ChunkEntry) {
        self.entries.push(entry);
    }

    /// Number of chunks recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunks have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalize into an immutable [`Manifest`], stamped with the current time.
    pub fn finalize(
        self,
        artifact_sha256: Option<Sha256Digest>,
    ) -> Result<Manifest, ManifestError> {
        let created_at = now_secs();
        self.finalize_with_timestamp(artifact_sha256, created_at)
    }

    /// Finalize with an explicit timestamp (for deterministic testing).
    pub fn finalize_with_timestamp(
        mut self,
        artifact_sha256: Option<Sha256Digest>,
        created_at: u64,
    ) -> Result<Manifest, ManifestError> {
        self.entries.sort_by_key(|e| e.index);

        for (position, entry) in self.entries.iter().enumerate() {
            let expected = position as u64;
            if entry.index == expected {
                continue;
            }
            if position > 0 && entry.index == self.entries[position - 1].index {
                return Err(ManifestError::DuplicateIndex { index: entry.index });
            }
            return Err(ManifestError::NonContiguousIndex {
                expected,
                found: entry.index,
            });
        }

        let original_size: u64 = self.entries.iter().map(|e| e.original_size).sum();
        let compressed_size: u64 = self.entries.iter().map(|e| e.compressed_size).sum();

        Ok(Manifest {
            snapshot_id: self.snapshot_id,
            original_size,
            compressed_size,
            num_chunks: self.entries.len() as u64,
            chunk_size: self.strategy.chunk_size,
            compression: self.strategy.full_name(),
            created_at,
            artifact_sha256,
            chunk_list_sha256: Manifest::chunk_list_digest(&self.entries),
            chunks: self.entries,
        })
    }
}

/// Serialize a manifest to its persisted JSON form.
pub fn write_manifest(manifest: &Manifest) -> Result<Vec<u8>, ManifestError> {
    serde_json::to_vec_pretty(manifest).map_err(|e| ManifestError::Malformed(e.to_string()))
}

/// Parse and validate a persisted manifest.
///
/// Validation covers every structural invariant: required fields, index
/// contiguity, totals that re-sum from the chunk list, the chunk-list
/// completion checksum, a known strategy name, and a storage location for
/// every chunk. Any violation aborts before a single chunk transfer.
pub fn read_manifest(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let manifest: Manifest =
        serde_json::from_slice(bytes).map_err(|e| ManifestError::Malformed(e.to_string()))?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Validate the structural invariants of an already-parsed manifest.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), ManifestError> {
    if manifest.num_chunks != manifest.chunks.len() as u64 {
        return Err(ManifestError::ChunkCountMismatch {
            declared: manifest.num_chunks,
            found: manifest.chunks.len() as u64,
        });
    }

    for (position, entry) in manifest.chunks.iter().enumerate() {
        let expected = position as u64;
        if entry.index != expected {
            if position > 0 && entry.index == manifest.chunks[position - 1].index {
                return Err(ManifestError::DuplicateIndex { index: entry.index });
            }
            return Err(ManifestError::NonContiguousIndex {
                expected,
                found: entry.index,
            });
        }
        if entry.providers.is_empty() {
            return Err(ManifestError::MissingLocation { index: entry.index });
        }
    }

    let summed_original: u64 = manifest.chunks.iter().map(|e| e.original_size).sum();
    if summed_original != manifest.original_size {
        return Err(ManifestError::TotalMismatch {
            field: "original_size",
            declared: manifest.original_size,
            summed: summed_original,
        });
    }

    let summed_compressed: u64 = manifest.chunks.iter().map(|e| e.compressed_size).sum();
    if summed_compressed != manifest.compressed_size {
        return Err(ManifestError::TotalMismatch {
            field: "compressed_size",
            declared: manifest.compressed_size,
            summed: summed_compressed,
        });
    }

    if Manifest::chunk_list_digest(&manifest.chunks) != manifest.chunk_list_sha256 {
        return Err(ManifestError::ChunkListChecksum);
    }

    if Strategy::lookup(&manifest.compression).is_none() {
        return Err(ManifestError::UnknownStrategy {
            name: manifest.compression.clone(),
        });
    }

    Ok(())
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
