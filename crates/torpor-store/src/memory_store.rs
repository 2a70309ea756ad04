//! In-memory object storage backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// In-memory object store backed by a `RwLock<BTreeMap>`.
///
/// Used by tests and the benchmark command. `put_if_absent` is atomic
/// under the write lock, which is what makes the concurrent-finalize
/// tests deterministic.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes currently stored (for benchmark reporting).
    pub fn used_bytes(&self) -> u64 {
        let map = self.objects.read().expect("lock poisoned");
        map.values().map(|v| v.len() as u64).sum()
    }

    /// Replace an object's bytes directly, bypassing `put` semantics.
    ///
    /// Test hook for simulating corruption after upload.
    pub fn overwrite_raw(&self, key: &str, data: Bytes) {
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(key.to_string(), data);
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        debug!(key, size = data.len(), "storing object in memory");
        map.insert(key.to_string(), data);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool, StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), data);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn get_range(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Option<Bytes>, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        let Some(data) = map.get(key) else {
            return Ok(None);
        };

        let len = data.len() as u64;
        if offset > len {
            return Err(StoreError::InvalidRange {
                key: key.to_string(),
                offset,
                length,
            });
        }
        let end = (offset + length).min(len);
        Ok(Some(data.slice(offset as usize..end as usize)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(key);
        debug!(key, "deleted object from memory");
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
