//! [`SnapshotTransport`] — chunk and manifest transfer against the
//! configured provider set.

use std::sync::Arc;

use bytes::Bytes;
use torpor_store::{ObjectStore, StoreError};
use torpor_types::{ChunkEntry, CodecId, Manifest, PlacementPolicy, SnapshotId};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::keys::{chunk_key, manifest_key, snapshot_id_from_manifest_key, SNAPSHOTS_PREFIX};
use crate::placement::{assign_provider, resolve_provider};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// One configured storage provider: a name and its backend.
pub struct Provider {
    /// Name recorded in manifests (e.g. `"minio-a"`, `"r2-eu"`).
    pub name: String,
    /// Backend implementation.
    pub store: Arc<dyn ObjectStore>,
}

impl Provider {
    /// Create a named provider.
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

/// Transfer tuning, fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportConfig {
    /// How chunks are placed across providers.
    pub placement: PlacementPolicy,
    /// Retry budget for each individual storage operation.
    pub retry: RetryPolicy,
}

/// The provider set plus transfer logic.
///
/// Constructed once from explicit configuration and shared read-only by
/// all workers; there is deliberately no ambient global provider state.
/// The first provider is the primary: it holds every chunk under
/// [`PlacementPolicy::Single`] and decides the manifest write-once race.
pub struct SnapshotTransport {
    providers: Vec<Provider>,
    /// Provider names in configuration order (for resolution).
    names: Vec<String>,
    config: TransportConfig,
}

/// Alias used by the engine to share one transport across workers.
pub type ProviderSet = Vec<Provider>;

impl SnapshotTransport {
    /// Build a transport over the given providers.
    pub fn new(providers: ProviderSet, config: TransportConfig) -> Result<Self, TransportError> {
        if providers.is_empty() {
            return Err(TransportError::NoProviders);
        }
        let names = providers.iter().map(|p| p.name.clone()).collect();
        Ok(Self {
            providers,
            names,
            config,
        })
    }

    /// Number of configured providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Configured provider names, in order.
    pub fn provider_names(&self) -> &[String] {
        &self.names
    }

    /// The placement policy in effect.
    pub fn placement(&self) -> PlacementPolicy {
        self.config.placement
    }

    /// Upload one compressed chunk to its placed provider.
    ///
    /// Retries with backoff per the configured policy; exhaustion surfaces
    /// as [`TransportError::UploadFailed`] naming the chunk and provider.
    /// Returns the provider names now holding the chunk, for the manifest.
    pub async fn upload_chunk(
        &self,
        snapshot_id: &SnapshotId,
        index: u64,
        codec: CodecId,
        data: Bytes,
    ) -> Result<Vec<String>, TransportError> {
        let position = assign_provider(self.config.placement, self.providers.len(), index);
        let provider = &self.providers[position];
        let key = chunk_key(snapshot_id, index, codec);

        debug!(
            %snapshot_id,
            chunk = index,
            provider = %provider.name,
            size = data.len(),
            "uploading chunk"
        );

        retry_with_backoff(&self.config.retry, "chunk upload", || {
            provider.store.put(&key, data.clone())
        })
        .await
        .map_err(|e| TransportError::UploadFailed {
            chunk_index: index,
            provider: provider.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(vec![provider.name.clone()])
    }

    /// Download one chunk, trying each recorded location in order.
    ///
    /// An unreachable provider is skipped transparently when the manifest
    /// records an alternate location; the caller only sees an error once
    /// every location has been exhausted.
    pub async fn download_chunk(
        &self,
        snapshot_id: &SnapshotId,
        entry: &ChunkEntry,
    ) -> Result<Bytes, TransportError> {
        let key = chunk_key(snapshot_id, entry.index, entry.codec);

        let mut resolved_any = false;
        let mut all_unreachable = true;
        let mut last_provider = String::new();
        let mut last_reason = String::from("chunk not found on any recorded provider");

        for recorded in &entry.providers {
            let Some(position) = resolve_provider(&self.names, recorded) else {
                warn!(recorded, chunk = entry.index, "recorded provider not configured");
                continue;
            };
            resolved_any = true;
            let provider = &self.providers[position];

            match retry_with_backoff(&self.config.retry, "chunk download", || {
                provider.store.get(&key)
            })
            .await
            {
                Ok(Some(data)) => {
                    debug!(
                        %snapshot_id,
                        chunk = entry.index,
                        provider = %provider.name,
                        size = data.len(),
                        "downloaded chunk"
                    );
                    return Ok(data);
                }
                Ok(None) => {
                    all_unreachable = false;
                    warn!(chunk = entry.index, provider = %provider.name, "chunk object missing");
                    last_provider = provider.name.clone();
                    last_reason = format!("not found on {}", provider.name);
                }
                Err(err) => {
                    if !matches!(err, StoreError::Unreachable(_)) {
                        all_unreachable = false;
                    }
                    warn!(
                        chunk = entry.index,
                        provider = %provider.name,
                        error = %err,
                        "chunk download failed, trying alternate location"
                    );
                    last_provider = provider.name.clone();
                    last_reason = err.to_string();
                }
            }
        }

        if !resolved_any {
            return Err(TransportError::UnknownProvider {
                name: entry.providers.first().cloned().unwrap_or_default(),
            });
        }
        if all_unreachable {
            return Err(TransportError::ProviderUnavailable {
                provider: last_provider,
                reason: last_reason,
            });
        }
        Err(TransportError::DownloadFailed {
            chunk_index: entry.index,
            reason: last_reason,
        })
    }

    /// Download a byte range of a chunk from its first reachable location.
    ///
    /// Used for resuming large chunk transfers; semantics otherwise match
    /// [`download_chunk`](Self::download_chunk).
    pub async fn download_chunk_range(
        &self,
        snapshot_id: &SnapshotId,
        entry: &ChunkEntry,
        offset: u64,
        length: u64,
    ) -> Result<Bytes, TransportError> {
        let key = chunk_key(snapshot_id, entry.index, entry.codec);

        let mut last_reason = String::from("chunk not found on any recorded provider");
        for recorded in &entry.providers {
            let Some(position) = resolve_provider(&self.names, recorded) else {
                continue;
            };
            let provider = &self.providers[position];
            match retry_with_backoff(&self.config.retry, "chunk range download", || {
                provider.store.get_range(&key, offset, length)
            })
            .await
            {
                Ok(Some(data)) => return Ok(data),
                Ok(None) => last_reason = format!("not found on {}", provider.name),
                Err(err) => last_reason = err.to_string(),
            }
        }
        Err(TransportError::DownloadFailed {
            chunk_index: entry.index,
            reason: last_reason,
        })
    }

    /// Publish a finalized manifest, write-once.
    ///
    /// The primary provider arbitrates: a conditional put decides which of
    /// two racing writers wins, and the loser gets
    /// [`TransportError::ManifestAlreadyExists`]. Replicas on the
    /// remaining providers are best-effort, for read fallback when the
    /// primary is down.
    pub async fn publish_manifest(
        &self,
        snapshot_id: &SnapshotId,
        manifest_bytes: Bytes,
    ) -> Result<(), TransportError> {
        let key = manifest_key(snapshot_id);
        let primary = &self.providers[0];

        let stored = retry_with_backoff(&self.config.retry, "manifest publish", || {
            primary.store.put_if_absent(&key, manifest_bytes.clone())
        })
        .await
        .map_err(|e| match e {
            StoreError::Unreachable(reason) => TransportError::ProviderUnavailable {
                provider: primary.name.clone(),
                reason,
            },
            other => TransportError::Store(other),
        })?;

        if !stored {
            return Err(TransportError::ManifestAlreadyExists {
                snapshot_id: snapshot_id.clone(),
            });
        }

        for replica in &self.providers[1..] {
            if let Err(err) = replica.store.put(&key, manifest_bytes.clone()).await {
                warn!(
                    provider = %replica.name,
                    error = %err,
                    "manifest replica write failed (non-fatal)"
                );
            }
        }

        info!(%snapshot_id, "manifest published");
        Ok(())
    }

    /// Fetch a snapshot's manifest, falling back across providers.
    ///
    /// Returns `Ok(None)` when no reachable provider has it; errors only
    /// when every provider was unreachable.
    pub async fn fetch_manifest(
        &self,
        snapshot_id: &SnapshotId,
    ) -> Result<Option<Bytes>, TransportError> {
        let key = manifest_key(snapshot_id);

        let mut last_err: Option<(String, String)> = None;
        let mut any_reachable = false;

        for provider in &self.providers {
            match retry_with_backoff(&self.config.retry, "manifest fetch", || {
                provider.store.get(&key)
            })
            .await
            {
                Ok(Some(data)) => return Ok(Some(data)),
                Ok(None) => any_reachable = true,
                Err(err) => {
                    warn!(provider = %provider.name, error = %err, "manifest fetch failed");
                    last_err = Some((provider.name.clone(), err.to_string()));
                }
            }
        }

        if any_reachable {
            return Ok(None);
        }
        let (provider, reason) = last_err.unwrap_or_default();
        Err(TransportError::ProviderUnavailable { provider, reason })
    }

    /// Delete every object belonging to a snapshot.
    ///
    /// Chunk objects go first, on every recorded provider; the manifest
    /// goes last, so an interrupted prune leaves a recognizably incomplete
    /// snapshot instead of orphaned chunks with no index.
    pub async fn delete_snapshot(&self, manifest: &Manifest) -> Result<(), TransportError> {
        let snapshot_id = &manifest.snapshot_id;

        for entry in &manifest.chunks {
            let key = chunk_key(snapshot_id, entry.index, entry.codec);
            for recorded in &entry.providers {
                let Some(position) = resolve_provider(&self.names, recorded) else {
                    warn!(recorded, chunk = entry.index, "skipping unresolvable provider on delete");
                    continue;
                };
                let provider = &self.providers[position];
                retry_with_backoff(&self.config.retry, "chunk delete", || {
                    provider.store.delete(&key)
                })
                .await?;
            }
        }

        let key = manifest_key(snapshot_id);
        for provider in self.providers.iter().rev() {
            retry_with_backoff(&self.config.retry, "manifest delete", || {
                provider.store.delete(&key)
            })
            .await?;
        }

        info!(%snapshot_id, chunks = manifest.chunks.len(), "snapshot deleted");
        Ok(())
    }

    /// List snapshot ids visible on the first reachable provider.
    pub async fn list_snapshot_ids(&self) -> Result<Vec<String>, TransportError> {
        let mut last_err: Option<(String, String)> = None;

        for provider in &self.providers {
            match provider.store.list(SNAPSHOTS_PREFIX).await {
                Ok(keys) => {
                    let mut ids: Vec<String> = keys
                        .iter()
                        .filter_map(|k| snapshot_id_from_manifest_key(k))
                        .map(str::to_string)
                        .collect();
                    ids.sort();
                    return Ok(ids);
                }
                Err(err) => {
                    warn!(provider = %provider.name, error = %err, "list failed");
                    last_err = Some((provider.name.clone(), err.to_string()));
                }
            }
        }

        let (provider, reason) = last_err.unwrap_or_default();
        Err(TransportError::ProviderUnavailable { provider, reason })
    }
}
