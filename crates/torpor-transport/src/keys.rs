//! Bucket key layout for snapshot objects.
//!
//! Layout: `snapshots/{snapshot_id}/chunk_{index:03}.{ext}` for chunks
//! and `snapshots/{snapshot_id}/manifest.json` for the manifest. Chunk
//! indices are zero-padded to three digits so lexicographic listings come
//! back in stream order for snapshots up to 1000 chunks; wider indices
//! extend naturally.

use torpor_types::{CodecId, SnapshotId};

/// Prefix under which every snapshot object lives.
pub const SNAPSHOTS_PREFIX: &str = "snapshots/";

const MANIFEST_FILE: &str = "manifest.json";

/// Object key for one compressed chunk.
pub fn chunk_key(snapshot_id: &SnapshotId, index: u64, codec: CodecId) -> String {
    format!(
        "{SNAPSHOTS_PREFIX}{snapshot_id}/chunk_{index:03}.{}",
        codec.extension()
    )
}

/// Object key for a snapshot's manifest.
pub fn manifest_key(snapshot_id: &SnapshotId) -> String {
    format!("{SNAPSHOTS_PREFIX}{snapshot_id}/{MANIFEST_FILE}")
}

/// Extract the snapshot id from a manifest object key, if the key is one.
pub fn snapshot_id_from_manifest_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(SNAPSHOTS_PREFIX)?;
    let (id, file) = rest.split_once('/')?;
    (file == MANIFEST_FILE && !id.is_empty()).then_some(id)
}
