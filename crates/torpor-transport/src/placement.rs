//! Chunk-to-provider placement and provider-name resolution.

use torpor_types::PlacementPolicy;
use tracing::warn;

/// Pick the provider (by position in the configured set) for a chunk.
///
/// `Single` sends every chunk to the primary provider; `Striped` assigns
/// round-robin by chunk index, so a snapshot's chunks spread evenly and
/// restores can pull from all providers in parallel.
pub fn assign_provider(policy: PlacementPolicy, provider_count: usize, chunk_index: u64) -> usize {
    match policy {
        PlacementPolicy::Single => 0,
        PlacementPolicy::Striped => (chunk_index % provider_count.max(1) as u64) as usize,
    }
}

/// Resolve a provider name recorded in a manifest against the configured
/// provider names.
///
/// Exact match wins. Failing that, a best-effort substring fallback is
/// applied: case-insensitive containment in either direction, first
/// configured match wins. This mirrors how older deployments recorded
/// region-qualified names ("s3-us-east-1") against configs that list the
/// bare region; the ambiguity is accepted as degraded-confidence behavior
/// and logged, not rejected.
pub fn resolve_provider(configured: &[String], recorded: &str) -> Option<usize> {
    if let Some(position) = configured.iter().position(|name| name == recorded) {
        return Some(position);
    }

    let recorded_lower = recorded.to_lowercase();
    let fallback = configured.iter().position(|name| {
        let name_lower = name.to_lowercase();
        name_lower.contains(&recorded_lower) || recorded_lower.contains(&name_lower)
    })?;
    warn!(
        recorded,
        matched = %configured[fallback],
        "provider name resolved by substring fallback"
    );
    Some(fallback)
}
