//! Object storage backends for torpor snapshots.
//!
//! This crate provides:
//! - [`ObjectStore`] — the storage trait the transport layer talks to.
//! - [`S3Store`] — any S3-compatible endpoint via `aws-sdk-s3`.
//! - [`MemoryStore`] — in-memory backend for tests and benchmarks.
//! - [`FlakyStore`] — failure-injection wrapper for tests.

mod error;
mod flaky_store;
mod memory_store;
mod s3_store;
mod traits;

pub use error::StoreError;
pub use flaky_store::FlakyStore;
pub use memory_store::MemoryStore;
pub use s3_store::{S3Store, S3StoreConfig};
pub use traits::ObjectStore;
