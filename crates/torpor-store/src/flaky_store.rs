//! An [`ObjectStore`] wrapper with switchable failure injection.
//!
//! `FlakyStore` wraps any `Arc<dyn ObjectStore>` and can be flipped into
//! an unreachable state, made to fail a bounded number of operations, or
//! told to corrupt specific objects on read. Used by transport and engine
//! tests to exercise retry, provider fallback, and integrity paths
//! without a real network.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};

use crate::error::StoreError;
use crate::traits::ObjectStore;

/// A fault-injecting [`ObjectStore`] wrapper.
pub struct FlakyStore {
    inner: Arc<dyn ObjectStore>,
    unreachable: AtomicBool,
    /// Remaining operations that fail with `Unreachable` before the store
    /// recovers. Lets tests exercise retry-until-success.
    failures_left: AtomicU32,
    corrupt_keys: Mutex<HashSet<String>>,
}

impl FlakyStore {
    /// Wrap an existing store; fully transparent until faults are armed.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            unreachable: AtomicBool::new(false),
            failures_left: AtomicU32::new(0),
            corrupt_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Mark the store unreachable (or reachable again).
    pub fn set_unreachable(&self, down: bool) {
        self.unreachable.store(down, Ordering::SeqCst);
    }

    /// Fail the next `n` operations with `Unreachable`, then recover.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Flip one bit in the stored object every time `key` is read.
    pub fn corrupt_object(&self, key: &str) {
        self.corrupt_keys
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string());
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("store marked unreachable".into()));
        }
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unreachable("injected transient failure".into()));
        }
        Ok(())
    }

    fn maybe_corrupt(&self, key: &str, data: Bytes) -> Bytes {
        let corrupt = self
            .corrupt_keys
            .lock()
            .expect("lock poisoned")
            .contains(key);
        if !corrupt || data.is_empty() {
            return data;
        }
        let mut mutated = BytesMut::from(&data[..]);
        let mid = mutated.len() / 2;
        mutated[mid] ^= 0x01;
        mutated.freeze()
    }
}

#[async_trait::async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        self.check_reachable()?;
        self.inner.put(key, data).await
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool, StoreError> {
        self.check_reachable()?;
        self.inner.put_if_absent(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.check_reachable()?;
        let data = self.inner.get(key).await?;
        Ok(data.map(|d| self.maybe_corrupt(key, d)))
    }

    async fn get_range(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Option<Bytes>, StoreError> {
        self.check_reachable()?;
        let data = self.inner.get_range(key, offset, length).await?;
        Ok(data.map(|d| self.maybe_corrupt(key, d)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_reachable()?;
        self.inner.delete(key).await
    }

    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        self.check_reachable()?;
        self.inner.contains(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_reachable()?;
        self.inner.list(prefix).await
    }
}
