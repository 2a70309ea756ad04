//! Multi-provider chunk transfer for torpor snapshots.
//!
//! This crate moves chunk and manifest objects between the engine and one
//! or more configured object-storage providers:
//! - [`ProviderSet`] — the immutable provider configuration, constructed
//!   once and passed in (never ambient global state).
//! - [`SnapshotTransport`] — upload/download with bounded
//!   retry-with-backoff, per-snapshot placement ([`PlacementPolicy`]),
//!   alternate-provider download fallback, and write-once manifest
//!   publication.
//! - [`chunk_key`] / [`manifest_key`] — the bucket key layout.
//!
//! [`PlacementPolicy`]: torpor_types::PlacementPolicy

mod error;
mod keys;
mod placement;
mod retry;
mod transport;

pub use error::TransportError;
pub use keys::{chunk_key, manifest_key, snapshot_id_from_manifest_key, SNAPSHOTS_PREFIX};
pub use placement::{assign_provider, resolve_provider};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use transport::{Provider, ProviderSet, SnapshotTransport, TransportConfig};
