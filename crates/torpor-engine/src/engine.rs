//! [`SnapshotEngine`] — the orchestrator that ties chunking, compression,
//! transfer, and verification together.
//!
//! A `SnapshotEngine` owns the transport (provider set) and strategy, and
//! exposes the snapshot/restore/delete pipeline consumed by the
//! hibernation control loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use torpor_chunk::{Chunker, ManifestBuilder, read_manifest, write_manifest};
use torpor_codec::select_codec;
use torpor_transport::SnapshotTransport;
use torpor_types::{ChunkEntry, ContentClass, Manifest, Sha256Digest, SnapshotId, Strategy};

use crate::error::EngineError;
use crate::lifecycle::{RestoreLifecycle, RestoreState, SnapshotLifecycle, SnapshotState};
use crate::verify::{hash_file, verify_artifact, verify_chunk};
use crate::workspace::WorkspaceRef;

/// Engine tuning, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Compression strategy (chunk size + codec rules).
    pub strategy: Strategy,
    /// Concurrent compression/decompression workers. 0 = available cores.
    pub compress_workers: usize,
    /// Concurrent chunk transfers. Network-bound, so the default bound is
    /// wider than the CPU pool.
    pub transfer_workers: usize,
    /// Whether restore re-hashes the whole reassembled artifact.
    pub verify_artifact: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::balanced_v1(),
            compress_workers: 0,
            transfer_workers: 16,
            verify_artifact: true,
        }
    }
}

impl EngineConfig {
    fn effective_compress_workers(&self) -> usize {
        if self.compress_workers > 0 {
            return self.compress_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

/// Cooperative cancellation flag, checked between chunk boundaries.
///
/// In-flight chunk operations run to completion before the cancellation
/// is honored; a cancelled snapshot never publishes a manifest.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an un-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A snapshot request: what to capture and how it is classified.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    /// The staged workspace archive to capture.
    pub workspace: WorkspaceRef,
    /// Declared content class of the workspace payload.
    pub content_class: ContentClass,
    /// Externally-chosen snapshot id; generated when `None`.
    pub snapshot_id: Option<SnapshotId>,
}

/// Result of a completed snapshot, consumed by the control loop.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    /// The finalized snapshot's id.
    pub snapshot_id: SnapshotId,
    /// Total uncompressed bytes captured.
    pub size_original: u64,
    /// Total compressed bytes stored.
    pub size_compressed: u64,
    /// `size_original / size_compressed`.
    pub compression_ratio: f64,
    /// Number of chunks written.
    pub num_chunks: u64,
}

/// Result of a completed restore, consumed by the control loop.
#[derive(Debug, Clone)]
pub struct RestoreHandle {
    /// The restored snapshot's id.
    pub snapshot_id: SnapshotId,
    /// Cumulative time spent downloading chunks (across workers).
    pub download_time: Duration,
    /// Cumulative time spent decompressing and verifying chunks.
    pub decompress_time: Duration,
}

/// The snapshot/restore orchestrator.
pub struct SnapshotEngine {
    transport: Arc<SnapshotTransport>,
    config: EngineConfig,
}

impl SnapshotEngine {
    /// Create an engine over the given transport.
    pub fn new(transport: Arc<SnapshotTransport>, config: EngineConfig) -> Self {
        Self { transport, config }
    }

    /// The strategy in effect.
    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &Arc<SnapshotTransport> {
        &self.transport
    }

    // ------------------------------------------------------------------
    // Snapshot path
    // ------------------------------------------------------------------

    /// Capture a workspace into a new snapshot.
    pub async fn create_snapshot(
        &self,
        request: SnapshotRequest,
    ) -> Result<SnapshotHandle, EngineError> {
        self.create_snapshot_with_cancel(request, &CancelFlag::new())
            .await
    }

    /// Capture a workspace, honoring a cancellation flag between chunks.
    pub async fn create_snapshot_with_cancel(
        &self,
        request: SnapshotRequest,
        cancel: &CancelFlag,
    ) -> Result<SnapshotHandle, EngineError> {
        let snapshot_id = request
            .snapshot_id
            .clone()
            .unwrap_or_else(SnapshotId::generate);
        let mut lifecycle = SnapshotLifecycle::new();

        info!(
            %snapshot_id,
            archive = %request.workspace.archive.display(),
            strategy = %self.config.strategy.full_name(),
            "snapshot: starting"
        );

        match self
            .run_snapshot(&snapshot_id, &request, cancel, &mut lifecycle)
            .await
        {
            Ok(handle) => {
                info!(
                    %snapshot_id,
                    original = handle.size_original,
                    compressed = handle.size_compressed,
                    ratio = format!("{:.2}", handle.compression_ratio),
                    chunks = handle.num_chunks,
                    "snapshot: complete"
                );
                Ok(handle)
            }
            Err(err) => {
                lifecycle.fail();
                error!(%snapshot_id, error = %err, "snapshot: failed");
                Err(err)
            }
        }
    }

    async fn run_snapshot(
        &self,
        snapshot_id: &SnapshotId,
        request: &SnapshotRequest,
        cancel: &CancelFlag,
        lifecycle: &mut SnapshotLifecycle,
    ) -> Result<SnapshotHandle, EngineError> {
        let strategy = self.config.strategy;
        let class = request.content_class;
        let codec_id = select_codec(&strategy, class);

        lifecycle.advance(SnapshotState::Compressing)?;

        let file = tokio::fs::File::open(&request.workspace.archive).await?;
        let mut stream = Chunker::new(strategy.chunk_size).stream(file);

        let compress_sem = Arc::new(Semaphore::new(self.config.effective_compress_workers()));
        let transfer_sem = Arc::new(Semaphore::new(self.config.transfer_workers.max(1)));
        let mut workers: JoinSet<Result<ChunkEntry, EngineError>> = JoinSet::new();
        let mut builder = ManifestBuilder::new(snapshot_id.clone(), strategy);
        let mut artifact_hasher = Sha256::new();

        loop {
            // Collect already-finished chunks so a failed upload aborts the
            // pipeline instead of reading the whole workspace first.
            while let Some(joined) = workers.try_join_next() {
                match join_result(joined) {
                    Ok(entry) => builder.add_chunk(entry),
                    Err(err) => {
                        workers.shutdown().await;
                        return Err(err);
                    }
                }
            }

            if cancel.is_cancelled() {
                drain(&mut workers).await;
                return Err(EngineError::Cancelled);
            }

            let Some(chunk) = stream.next_chunk().await? else {
                break;
            };
            artifact_hasher.update(&chunk.data);

            let compress_permit = compress_sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let transfer_sem = transfer_sem.clone();
            let transport = self.transport.clone();
            let snapshot_id = snapshot_id.clone();

            workers.spawn(async move {
                let index = chunk.index;
                let original_size = chunk.data.len() as u64;

                let (digest, compressed) = tokio::task::spawn_blocking(move || {
                    let digest = Sha256Digest::from_data(&chunk.data);
                    let compressed = torpor_codec::compress(codec_id, class, &chunk.data)?;
                    Ok::<_, EngineError>((digest, compressed))
                })
                .await
                .map_err(|e| EngineError::Worker(e.to_string()))??;
                // Release the CPU slot before waiting on the network.
                drop(compress_permit);

                let compressed_size = compressed.len() as u64;
                let _transfer_permit = transfer_sem
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let providers = transport
                    .upload_chunk(&snapshot_id, index, codec_id, Bytes::from(compressed))
                    .await?;

                debug!(chunk = index, original_size, compressed_size, "chunk stored");
                Ok(ChunkEntry {
                    index,
                    original_size,
                    compressed_size,
                    codec: codec_id,
                    sha256: digest,
                    providers,
                })
            });
        }

        lifecycle.advance(SnapshotState::Uploading)?;

        while let Some(joined) = workers.join_next().await {
            match join_result(joined) {
                Ok(entry) => builder.add_chunk(entry),
                Err(err) => {
                    workers.shutdown().await;
                    return Err(err);
                }
            }
        }

        let artifact: [u8; 32] = artifact_hasher.finalize().into();
        let manifest = builder.finalize(Some(Sha256Digest::from(artifact)))?;
        let manifest_bytes = write_manifest(&manifest)?;
        self.transport
            .publish_manifest(snapshot_id, Bytes::from(manifest_bytes))
            .await?;

        lifecycle.advance(SnapshotState::Completed)?;

        Ok(SnapshotHandle {
            snapshot_id: manifest.snapshot_id.clone(),
            size_original: manifest.original_size,
            size_compressed: manifest.compressed_size,
            compression_ratio: manifest.compression_ratio(),
            num_chunks: manifest.num_chunks,
        })
    }

    // ------------------------------------------------------------------
    // Restore path
    // ------------------------------------------------------------------

    /// Reconstruct a snapshot into the given workspace path.
    pub async fn restore_snapshot(
        &self,
        snapshot_id: &SnapshotId,
        workspace: &WorkspaceRef,
    ) -> Result<RestoreHandle, EngineError> {
        self.restore_snapshot_with_cancel(snapshot_id, workspace, &CancelFlag::new())
            .await
    }

    /// Reconstruct a snapshot, honoring a cancellation flag between chunks.
    ///
    /// The artifact is reassembled into a `.partial` staging file and only
    /// renamed onto the target after every digest verifies — a failed or
    /// cancelled restore leaves an explicitly marked incomplete file, never
    /// a plausible-looking wrong one.
    pub async fn restore_snapshot_with_cancel(
        &self,
        snapshot_id: &SnapshotId,
        workspace: &WorkspaceRef,
        cancel: &CancelFlag,
    ) -> Result<RestoreHandle, EngineError> {
        let mut lifecycle = RestoreLifecycle::new();

        info!(
            %snapshot_id,
            target = %workspace.archive.display(),
            "restore: starting"
        );

        match self
            .run_restore(snapshot_id, workspace, cancel, &mut lifecycle)
            .await
        {
            Ok(handle) => {
                info!(
                    %snapshot_id,
                    download_ms = handle.download_time.as_millis() as u64,
                    decompress_ms = handle.decompress_time.as_millis() as u64,
                    "restore: complete"
                );
                Ok(handle)
            }
            Err(err) => {
                lifecycle.fail();
                error!(%snapshot_id, error = %err, "restore: failed");
                Err(err)
            }
        }
    }

    async fn run_restore(
        &self,
        snapshot_id: &SnapshotId,
        workspace: &WorkspaceRef,
        cancel: &CancelFlag,
        lifecycle: &mut RestoreLifecycle,
    ) -> Result<RestoreHandle, EngineError> {
        lifecycle.advance(RestoreState::Downloading)?;

        // The manifest must parse and validate before any chunk transfer.
        let manifest_bytes = self.transport.fetch_manifest(snapshot_id).await?.ok_or_else(|| {
            EngineError::ManifestMissing {
                snapshot_id: snapshot_id.clone(),
            }
        })?;
        let manifest = read_manifest(&manifest_bytes)?;
        debug!(
            chunks = manifest.num_chunks,
            original = manifest.original_size,
            "restore: manifest validated"
        );

        // Pre-sized staging file: chunk i lands at offset i * chunk_size,
        // so completion order does not matter.
        let staging = workspace.staging_path();
        let mut out = tokio::fs::File::create(&staging).await?;
        out.set_len(manifest.original_size).await?;

        let (tx, mut rx) = mpsc::channel::<(u64, Vec<u8>)>(self.config.transfer_workers.max(1));
        let writer = tokio::spawn(async move {
            while let Some((offset, data)) = rx.recv().await {
                out.seek(std::io::SeekFrom::Start(offset)).await?;
                out.write_all(&data).await?;
            }
            out.flush().await?;
            out.sync_all().await?;
            Ok::<_, std::io::Error>(())
        });

        let transfer_sem = Arc::new(Semaphore::new(self.config.transfer_workers.max(1)));
        let compress_sem = Arc::new(Semaphore::new(self.config.effective_compress_workers()));
        let download_nanos = Arc::new(AtomicU64::new(0));
        let decompress_nanos = Arc::new(AtomicU64::new(0));
        let chunk_size = manifest.chunk_size;
        let mut workers: JoinSet<Result<(), EngineError>> = JoinSet::new();
        let mut first_error: Option<EngineError> = None;

        for entry in manifest.chunks.iter().cloned() {
            if cancel.is_cancelled() {
                first_error = Some(EngineError::Cancelled);
                break;
            }
            // Fail fast: stop dispatching once any chunk has failed.
            let mut failed = None;
            while let Some(joined) = workers.try_join_next() {
                if let Err(err) = join_result(joined) {
                    failed = Some(err);
                    break;
                }
            }
            if let Some(err) = failed {
                first_error = Some(err);
                break;
            }

            let transfer_permit = transfer_sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let transport = self.transport.clone();
            let snapshot_id = snapshot_id.clone();
            let compress_sem = compress_sem.clone();
            let tx = tx.clone();
            let download_nanos = download_nanos.clone();
            let decompress_nanos = decompress_nanos.clone();

            workers.spawn(async move {
                let started = Instant::now();
                let compressed = transport.download_chunk(&snapshot_id, &entry).await?;
                download_nanos.fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
                drop(transfer_permit);

                let cpu_permit = compress_sem.acquire_owned().await.expect("semaphore closed");
                let started = Instant::now();
                let index = entry.index;
                let data = tokio::task::spawn_blocking(move || {
                    let data = torpor_codec::decompress(entry.codec, &compressed)?;
                    verify_chunk(&entry, &data)?;
                    Ok::<_, EngineError>(data)
                })
                .await
                .map_err(|e| EngineError::Worker(e.to_string()))??;
                decompress_nanos.fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
                drop(cpu_permit);

                tx.send((index * chunk_size, data))
                    .await
                    .map_err(|_| EngineError::Worker("output writer stopped".to_string()))?;
                Ok(())
            });
        }
        drop(tx);

        lifecycle.advance(RestoreState::Decompressing)?;

        if first_error.is_some() {
            // In-flight chunks run to completion, then the failure (or
            // cancellation) is honored. The staging file stays behind as
            // the explicit incomplete marker.
            drain(&mut workers).await;
            let _ = writer.await;
            return Err(first_error.expect("checked above"));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = join_result(joined) {
                workers.shutdown().await;
                let _ = writer.await;
                return Err(err);
            }
        }
        writer
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))??;

        lifecycle.advance(RestoreState::Verifying)?;
        if self.config.verify_artifact
            && let Some(expected) = manifest.artifact_sha256
        {
            let actual = hash_file(&staging).await?;
            verify_artifact(expected, actual)?;
        }

        tokio::fs::rename(&staging, &workspace.archive).await?;
        lifecycle.advance(RestoreState::Restored)?;

        Ok(RestoreHandle {
            snapshot_id: manifest.snapshot_id.clone(),
            download_time: Duration::from_nanos(download_nanos.load(Ordering::Relaxed)),
            decompress_time: Duration::from_nanos(decompress_nanos.load(Ordering::Relaxed)),
        })
    }

    // ------------------------------------------------------------------
    // Management
    // ------------------------------------------------------------------

    /// Fetch and validate a snapshot's manifest.
    pub async fn snapshot_manifest(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Manifest, EngineError> {
        let bytes = self.transport.fetch_manifest(snapshot_id).await?.ok_or_else(|| {
            EngineError::ManifestMissing {
                snapshot_id: snapshot_id.clone(),
            }
        })?;
        Ok(read_manifest(&bytes)?)
    }

    /// Delete a snapshot: every chunk object on every recorded provider,
    /// then the manifest.
    pub async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), EngineError> {
        let manifest = self.snapshot_manifest(snapshot_id).await?;
        self.transport.delete_snapshot(&manifest).await?;
        Ok(())
    }

    /// List snapshot ids known to the providers.
    pub async fn list_snapshots(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.transport.list_snapshot_ids().await?)
    }
}

fn join_result<T>(
    joined: Result<Result<T, EngineError>, tokio::task::JoinError>,
) -> Result<T, EngineError> {
    match joined {
        Ok(inner) => inner,
        Err(e) => Err(EngineError::Worker(e.to_string())),
    }
}

/// Let in-flight workers run to completion, discarding their results.
async fn drain<T: Send + 'static>(workers: &mut JoinSet<Result<T, EngineError>>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = join_result(joined) {
            debug!(error = %err, "in-flight chunk operation failed during drain");
        }
    }
}
