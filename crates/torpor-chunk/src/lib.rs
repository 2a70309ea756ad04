//! Chunking and manifest handling for torpor snapshots.
//!
//! This crate provides:
//! - [`Chunker`] / [`ChunkStream`] — split a workspace byte stream into
//!   fixed-size chunks, either in memory or lazily with bounded buffering.
//! - [`ManifestBuilder`] — accumulates per-chunk metadata while chunks are
//!   compressed and uploaded, and finalizes into an immutable [`Manifest`].
//! - [`read_manifest`] / [`write_manifest`] — the persisted JSON form,
//!   with structural validation on read.
//!
//! [`Manifest`]: torpor_types::Manifest

mod chunker;
mod error;
mod manifest;

pub use chunker::{Chunk, ChunkStream, Chunker, chunk_count};
pub use error::{ChunkError, ManifestError};
pub use manifest::{ManifestBuilder, read_manifest, write_manifest};
