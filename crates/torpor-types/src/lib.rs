//! Shared types for the torpor snapshot engine.
//!
//! This crate defines the types used across the torpor workspace:
//! identifiers ([`SnapshotId`], [`Sha256Digest`]), the persisted data
//! model ([`Manifest`], [`ChunkEntry`]), content classification
//! ([`ContentClass`], [`FloatDtype`]), codec identity ([`CodecId`]),
//! compression strategies ([`Strategy`]), and chunk placement
//! ([`PlacementPolicy`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

/// A SHA-256 digest, serialized as a 64-character lowercase hex string.
///
/// Used for chunk content hashes, the whole-artifact hash, and the
/// chunk-list completion checksum in the manifest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Compute the digest of arbitrary data.
    pub fn from_data(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Return the raw 32-byte representation.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = hex_nibble(hex.as_bytes()[i * 2])?;
            let lo = hex_nibble(hex.as_bytes()[i * 2 + 1])?;
            *byte = (hi << 4) | lo;
        }
        Some(Self(bytes))
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl From<[u8; 32]> for Sha256Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Sha256Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Digest({self})")
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid sha256 hex: {hex:?}")))
    }
}

// ---------------------------------------------------------------------------
// Snapshot identity
// ---------------------------------------------------------------------------

/// Globally unique, time-derived snapshot identifier.
///
/// Generated ids have the form `snap-{unix_seconds}-{8 hex chars}`.
/// Callers coordinating across processes may also supply their own id;
/// the write-once manifest upload rejects the second writer for a
/// duplicated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wrap an externally-supplied id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh time-derived id.
    pub fn generate() -> Self {
        use rand::RngCore;

        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut suffix = [0u8; 4];
        rand::rng().fill_bytes(&mut suffix);
        let suffix: String = suffix.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("snap-{secs}-{suffix}"))
    }

    /// Return the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Content classification and codecs
// ---------------------------------------------------------------------------

/// Declared floating-point element type of a numeric-weights payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatDtype {
    /// IEEE 754 half precision.
    F16,
    /// bfloat16.
    Bf16,
    /// IEEE 754 single precision.
    F32,
    /// Dtype not declared or not recognized.
    Unknown,
}

impl FloatDtype {
    /// Element width in bytes, if the dtype is known.
    pub fn width(&self) -> Option<usize> {
        match self {
            FloatDtype::F16 | FloatDtype::Bf16 => Some(2),
            FloatDtype::F32 => Some(4),
            FloatDtype::Unknown => None,
        }
    }
}

/// Declared content class of a workspace payload.
///
/// Classification is declared by the caller (from file extensions or
/// workspace metadata), never inferred from chunk bytes — the codec
/// selector must be a pure function of this declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// Source code, prose, configuration files.
    Text,
    /// Append-style log output.
    Log,
    /// CSV/parquet-like tabular data.
    Tabular,
    /// Floating-point tensor data (model weights, optimizer state).
    NumericWeights(FloatDtype),
    /// Unknown or mixed binary content.
    Opaque,
}

/// Identifier of a compression codec, persisted per chunk in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecId {
    /// General-purpose LZ4 block codec (throughput-first).
    #[serde(rename = "lz4")]
    Lz4,
    /// Byte-shuffle + zstd codec for floating-point tensor data.
    #[serde(rename = "numeric-zstd")]
    NumericZstd,
}

impl CodecId {
    /// Stable string form, as written into the manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecId::Lz4 => "lz4",
            CodecId::NumericZstd => "numeric-zstd",
        }
    }

    /// Object-key file extension for chunks encoded with this codec.
    pub fn extension(&self) -> &'static str {
        match self {
            CodecId::Lz4 => "lz4",
            CodecId::NumericZstd => "zst",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A named, versioned compression strategy.
///
/// Strategies are immutable once published: a `name-vN` pair always means
/// the same chunk size and codec-assignment rules, so old manifests stay
/// interpretable. New behavior gets a new version, never an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    /// Strategy family name.
    pub name: &'static str,
    /// Published version.
    pub version: u32,
    /// Fixed chunk size in bytes.
    pub chunk_size: u64,
    /// Whether numeric-weights chunks with a known float dtype are routed
    /// to the numeric codec. When false everything uses the general codec.
    pub numeric_codec: bool,
}

/// Default chunk size: 64 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

impl Strategy {
    /// The default strategy: 64 MiB chunks, numeric codec for declared
    /// float tensor data, LZ4 for everything else.
    pub fn balanced_v1() -> Self {
        Self {
            name: "balanced",
            version: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            numeric_codec: true,
        }
    }

    /// Throughput-first strategy: 64 MiB chunks, LZ4 everywhere.
    pub fn throughput_v1() -> Self {
        Self {
            name: "throughput",
            version: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            numeric_codec: false,
        }
    }

    /// Full `name-vN` identifier, as written into the manifest.
    pub fn full_name(&self) -> String {
        format!("{}-v{}", self.name, self.version)
    }

    /// Resolve a published strategy by its full `name-vN` identifier.
    ///
    /// Returns `None` for unknown names — the caller treats that as an
    /// invalid manifest rather than guessing at rules.
    pub fn lookup(full_name: &str) -> Option<Self> {
        match full_name {
            "balanced-v1" => Some(Self::balanced_v1()),
            "throughput-v1" => Some(Self::throughput_v1()),
            _ => None,
        }
    }

    /// Same strategy with a different chunk size.
    ///
    /// Used by tests and benchmarks; published manifests record the
    /// strategy name for codec rules and the chunk size separately.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// How a snapshot's chunks are distributed across configured providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementPolicy {
    /// All chunks to the primary (first configured) provider.
    #[default]
    Single,
    /// Chunks assigned round-robin across all configured providers.
    Striped,
}

// ---------------------------------------------------------------------------
// Manifest data model
// ---------------------------------------------------------------------------

/// Metadata for a single chunk within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// 0-based position in the workspace byte stream; defines reassembly order.
    pub index: u64,
    /// Size of the uncompressed chunk in bytes.
    pub original_size: u64,
    /// Size of the compressed chunk object in bytes.
    pub compressed_size: u64,
    /// Codec the chunk was compressed with.
    pub codec: CodecId,
    /// SHA-256 of the uncompressed chunk bytes.
    pub sha256: Sha256Digest,
    /// Provider names holding this chunk, in preference order.
    pub providers: Vec<String>,
}

/// Immutable index describing one snapshot.
///
/// The manifest is the sole source of truth for reassembly order and
/// completeness: a snapshot without a readable manifest is unusable even
/// if its chunk objects exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Snapshot this manifest describes.
    pub snapshot_id: SnapshotId,
    /// Total uncompressed size (sum of per-chunk `original_size`).
    pub original_size: u64,
    /// Total compressed size (sum of per-chunk `compressed_size`).
    pub compressed_size: u64,
    /// Number of chunks.
    pub num_chunks: u64,
    /// Fixed chunk size the stream was split with.
    pub chunk_size: u64,
    /// Full strategy identifier (`name-vN`).
    pub compression: String,
    /// Unix timestamp (seconds) when the snapshot was created.
    pub created_at: u64,
    /// SHA-256 over the whole uncompressed artifact, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<Sha256Digest>,
    /// Completion checksum over the ordered chunk digest list.
    pub chunk_list_sha256: Sha256Digest,
    /// Ordered chunk metadata.
    pub chunks: Vec<ChunkEntry>,
}

impl Manifest {
    /// Compute the completion checksum over an ordered chunk list.
    ///
    /// Hashes each chunk's index and content digest in order, so a
    /// manifest truncated or reordered after finalization fails
    /// validation.
    pub fn chunk_list_digest(chunks: &[ChunkEntry]) -> Sha256Digest {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk.index.to_le_bytes());
            hasher.update(chunk.sha256.as_bytes());
        }
        Sha256Digest(hasher.finalize().into())
    }

    /// Compression ratio (original / compressed); 1.0 for empty snapshots.
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            1.0
        } else {
            self.original_size as f64 / self.compressed_size as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
