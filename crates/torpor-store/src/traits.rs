//! Core trait for object storage backends.

use bytes::Bytes;

use crate::error::StoreError;

/// Trait for storing and retrieving snapshot objects by key.
///
/// Keys follow S3 semantics (opaque strings, `/`-separated by
/// convention). All implementations must be `Send + Sync` for use across
/// async tasks; data moves as [`Bytes`] to keep the transfer path
/// copy-free.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, overwriting any existing value.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Store an object only if the key does not already exist.
    ///
    /// Returns `false` (without writing) if the key was present. This is
    /// the primitive behind write-once manifest publication.
    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool, StoreError>;

    /// Retrieve an object. Returns `None` if not found.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Retrieve `length` bytes starting at `offset`.
    ///
    /// Returns `None` if the key does not exist. A range starting past the
    /// end of the object is an error; a range extending past the end is
    /// truncated, matching S3 ranged-GET semantics.
    async fn get_range(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Option<Bytes>, StoreError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether a key exists.
    async fn contains(&self, key: &str) -> Result<bool, StoreError>;

    /// List all keys with the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
