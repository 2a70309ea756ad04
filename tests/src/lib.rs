//! Shared test harness for torpor integration tests.
//!
//! Provides [`TestRig`] — an engine over N in-memory providers, each
//! wrapped in a [`FlakyStore`] so scenarios can mark providers
//! unreachable, inject transient failures, or corrupt stored objects.

use std::sync::Arc;

use bytes::Bytes;
use torpor_engine::{
    EngineConfig, EngineError, RestoreHandle, SnapshotEngine, SnapshotHandle, SnapshotRequest,
    WorkspaceRef,
};
use torpor_store::{FlakyStore, MemoryStore, ObjectStore};
use torpor_transport::{Provider, RetryPolicy, SnapshotTransport, TransportConfig};
use torpor_types::{ContentClass, PlacementPolicy, SnapshotId, Strategy};

/// An engine over in-memory providers, plus handles for fault injection.
pub struct TestRig {
    /// The engine under test.
    pub engine: SnapshotEngine,
    /// Raw backing stores, indexed like the providers.
    pub stores: Vec<Arc<MemoryStore>>,
    /// Fault-injection wrappers, indexed like the providers.
    pub flaky: Vec<Arc<FlakyStore>>,
    /// Scratch directory for workspace archives.
    pub dir: tempfile::TempDir,
}

/// Provider names used by the rig: `minio-a`, `minio-b`, ...
pub fn provider_name(index: usize) -> String {
    format!("minio-{}", (b'a' + index as u8) as char)
}

impl TestRig {
    /// Build a rig with `provider_count` providers and the given placement
    /// and chunk size.
    pub fn new(provider_count: usize, placement: PlacementPolicy, chunk_size: u64) -> Self {
        let mut stores = Vec::with_capacity(provider_count);
        let mut flaky = Vec::with_capacity(provider_count);
        let mut providers = Vec::with_capacity(provider_count);

        for index in 0..provider_count {
            let store = Arc::new(MemoryStore::new());
            let wrapper = Arc::new(FlakyStore::new(store.clone() as Arc<dyn ObjectStore>));
            providers.push(Provider::new(
                provider_name(index),
                wrapper.clone() as Arc<dyn ObjectStore>,
            ));
            stores.push(store);
            flaky.push(wrapper);
        }

        let transport = SnapshotTransport::new(
            providers,
            TransportConfig {
                placement,
                retry: RetryPolicy {
                    max_attempts: 3,
                    initial_delay: std::time::Duration::from_millis(1),
                    max_delay: std::time::Duration::from_millis(4),
                },
            },
        )
        .expect("rig has providers");

        let engine = SnapshotEngine::new(
            Arc::new(transport),
            EngineConfig {
                strategy: Strategy::balanced_v1().with_chunk_size(chunk_size),
                compress_workers: 2,
                transfer_workers: 4,
                verify_artifact: true,
            },
        );

        Self {
            engine,
            stores,
            flaky,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Write a workspace archive into the rig's scratch directory.
    pub async fn write_archive(&self, name: &str, data: &[u8]) -> WorkspaceRef {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, data).await.expect("write archive");
        WorkspaceRef::new(path)
    }

    /// Snapshot an archive with the given content class.
    pub async fn snapshot(
        &self,
        workspace: WorkspaceRef,
        class: ContentClass,
    ) -> Result<SnapshotHandle, EngineError> {
        self.engine
            .create_snapshot(SnapshotRequest {
                workspace,
                content_class: class,
                snapshot_id: None,
            })
            .await
    }

    /// Restore a snapshot to a fresh path and return the restored bytes.
    pub async fn restore(
        &self,
        snapshot_id: &SnapshotId,
        name: &str,
    ) -> Result<(RestoreHandle, Vec<u8>), EngineError> {
        let target = WorkspaceRef::new(self.dir.path().join(name));
        let handle = self.engine.restore_snapshot(snapshot_id, &target).await?;
        let data = tokio::fs::read(&target.archive).await?;
        Ok((handle, data))
    }

    /// Mark a provider unreachable (or reachable again).
    pub fn set_provider_down(&self, index: usize, down: bool) {
        self.flaky[index].set_unreachable(down);
    }

    /// Replace a stored object's bytes on one provider.
    pub fn overwrite_object(&self, provider: usize, key: &str, data: Vec<u8>) {
        self.stores[provider].overwrite_raw(key, Bytes::from(data));
    }

    /// Read a stored object's raw bytes from one provider.
    pub async fn read_object(&self, provider: usize, key: &str) -> Option<Vec<u8>> {
        self.stores[provider]
            .get(key)
            .await
            .expect("memory store get")
            .map(|b| b.to_vec())
    }
}

/// Deterministic pseudo-random payload (incompressible-ish).
pub fn opaque_payload(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    for _ in 0..len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        data.push((state >> 56) as u8);
    }
    data
}

/// fp16-style tensor payload: noisy mantissa bytes, slowly drifting
/// exponent bytes.
pub fn tensor_payload(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for i in 0..len / 2 {
        data.push((i as u32).wrapping_mul(2654435761) as u8);
        data.push(0x3C + ((i / 512) as u8 & 0x03));
    }
    data
}

/// Compressible text-like payload.
pub fn text_payload(len: usize) -> Vec<u8> {
    b"fn train(epoch: usize) -> Loss { step(epoch) }\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}
