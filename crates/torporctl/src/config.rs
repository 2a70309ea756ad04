//! TOML configuration for the torpor CLI.
//!
//! Providers are listed as `[[provider]]` tables; credentials may live in
//! the file or come from `TORPOR_<NAME>_ACCESS_KEY_ID` /
//! `TORPOR_<NAME>_SECRET_ACCESS_KEY` environment variables (provider name
//! uppercased, dashes to underscores).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use torpor_types::{PlacementPolicy, Strategy};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Configured storage providers, in preference order (first is primary).
    pub provider: Vec<ProviderSection>,
    /// Snapshot strategy and tuning.
    pub snapshot: SnapshotSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// One `[[provider]]` table.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Name recorded in manifests.
    pub name: String,
    /// S3-compatible endpoint URL.
    pub endpoint: String,
    /// Bucket holding snapshot objects.
    pub bucket: String,
    /// Region name; most S3-compatible stores accept anything.
    pub region: String,
    /// Access key id. Falls back to the environment when empty.
    pub access_key_id: String,
    /// Secret access key. Falls back to the environment when empty.
    pub secret_access_key: String,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: String::new(),
            bucket: "torpor-snapshots".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

impl ProviderSection {
    /// Environment variable prefix for this provider's credentials.
    fn env_prefix(&self) -> String {
        format!("TORPOR_{}", self.name.to_uppercase().replace('-', "_"))
    }

    /// Resolve credentials from the file or the environment.
    pub fn credentials(&self) -> anyhow::Result<(String, String)> {
        let prefix = self.env_prefix();
        let access = if self.access_key_id.is_empty() {
            std::env::var(format!("{prefix}_ACCESS_KEY_ID")).map_err(|_| {
                anyhow::anyhow!(
                    "no access key for provider {:?} (set {prefix}_ACCESS_KEY_ID)",
                    self.name
                )
            })?
        } else {
            self.access_key_id.clone()
        };
        let secret = if self.secret_access_key.is_empty() {
            std::env::var(format!("{prefix}_SECRET_ACCESS_KEY")).map_err(|_| {
                anyhow::anyhow!(
                    "no secret key for provider {:?} (set {prefix}_SECRET_ACCESS_KEY)",
                    self.name
                )
            })?
        } else {
            self.secret_access_key.clone()
        };
        Ok((access, secret))
    }
}

/// `[snapshot]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SnapshotSection {
    /// Strategy identifier (`name-vN`).
    pub strategy: String,
    /// Chunk size override, e.g. `"64MiB"` or a raw byte count.
    pub chunk_size: Option<String>,
    /// Placement policy: `"single"` (default) or `"striped"`.
    pub placement: String,
    /// Compression worker count. 0 = available cores.
    pub compress_workers: Option<usize>,
    /// Transfer worker count.
    pub transfer_workers: Option<usize>,
    /// Whether restores re-hash the whole artifact.
    pub verify_artifact: Option<bool>,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            strategy: "balanced-v1".to_string(),
            chunk_size: None,
            placement: "single".to_string(),
            compress_workers: None,
            transfer_workers: None,
            verify_artifact: None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, an existing default location, or
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(&p)?;
                Ok(toml::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Default config location: `<config_dir>/torpor/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("torpor").join("config.toml"))
    }

    /// Effective strategy: named rules plus any chunk-size override.
    pub fn strategy(&self) -> anyhow::Result<Strategy> {
        let mut strategy = Strategy::lookup(&self.snapshot.strategy)
            .ok_or_else(|| anyhow::anyhow!("unknown strategy {:?}", self.snapshot.strategy))?;
        if let Some(raw) = &self.snapshot.chunk_size {
            strategy.chunk_size = parse_size(raw)
                .ok_or_else(|| anyhow::anyhow!("unparseable chunk_size {raw:?}"))?;
        }
        Ok(strategy)
    }

    /// Effective placement policy.
    pub fn placement(&self) -> anyhow::Result<PlacementPolicy> {
        match self.snapshot.placement.as_str() {
            "single" => Ok(PlacementPolicy::Single),
            "striped" => Ok(PlacementPolicy::Striped),
            other => Err(anyhow::anyhow!(
                "unknown placement {other:?} (expected \"single\" or \"striped\")"
            )),
        }
    }

    /// Effective compression worker count (0 = auto).
    pub fn compress_workers(&self) -> usize {
        self.snapshot.compress_workers.unwrap_or(0)
    }

    /// Effective transfer worker count.
    pub fn transfer_workers(&self) -> usize {
        self.snapshot.transfer_workers.unwrap_or(16)
    }

    /// Whether restores verify the whole artifact digest.
    pub fn verify_artifact(&self) -> bool {
        self.snapshot.verify_artifact.unwrap_or(true)
    }
}

/// Parse a human-readable size into bytes.
///
/// Supports `"64MiB"`, `"1GiB"`, `"512KiB"`, and raw byte counts.
pub fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(num) = s.strip_suffix("GiB") {
        return num.trim().parse::<u64>().ok().map(|n| n * 1_073_741_824);
    }
    if let Some(num) = s.strip_suffix("MiB") {
        return num.trim().parse::<u64>().ok().map(|n| n * 1_048_576);
    }
    if let Some(num) = s.strip_suffix("KiB") {
        return num.trim().parse::<u64>().ok().map(|n| n * 1_024);
    }
    s.parse::<u64>().ok()
}
