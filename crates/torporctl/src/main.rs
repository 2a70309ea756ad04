//! `torporctl` — CLI for the torpor GPU workspace snapshot engine.
//!
//! # Usage
//!
//! ```text
//! torporctl snapshot ./workspace.tar --class weights-f16
//! torporctl restore snap-1761234567-9f3a1c22 ./workspace.tar
//! torporctl list
//! torporctl status snap-1761234567-9f3a1c22
//! torporctl delete snap-1761234567-9f3a1c22
//! torporctl benchmark -n 8 -s 4194304
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use torpor_engine::{EngineConfig, SnapshotEngine, SnapshotRequest, WorkspaceRef};
use torpor_store::{MemoryStore, ObjectStore, S3Store, S3StoreConfig};
use torpor_transport::{Provider, RetryPolicy, SnapshotTransport, TransportConfig};
use torpor_types::{ContentClass, FloatDtype, PlacementPolicy, SnapshotId, Strategy};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "torporctl",
    version,
    about = "GPU workspace snapshot engine"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a staged workspace archive into a new snapshot.
    Snapshot {
        /// Workspace archive to capture.
        archive: PathBuf,

        /// Declared content class: text, log, tabular, weights,
        /// weights-f16, weights-bf16, weights-f32, or opaque.
        #[arg(short = 'C', long, default_value = "opaque")]
        class: String,

        /// Use an externally-chosen snapshot id instead of generating one.
        #[arg(long)]
        snapshot_id: Option<String>,
    },

    /// Reconstruct a snapshot into a workspace archive.
    Restore {
        /// Snapshot to restore.
        snapshot_id: String,

        /// Target archive path.
        target: PathBuf,
    },

    /// List snapshots known to the configured providers.
    List,

    /// Show a snapshot's manifest summary.
    Status {
        /// Snapshot to inspect.
        snapshot_id: String,
    },

    /// Delete a snapshot's chunks and manifest from all providers.
    Delete {
        /// Snapshot to delete.
        snapshot_id: String,
    },

    /// Run an in-memory snapshot/restore benchmark.
    Benchmark {
        /// Number of snapshot/restore cycles.
        #[arg(short = 'n', long, default_value = "4")]
        count: usize,

        /// Workspace size in bytes per cycle.
        #[arg(short, long, default_value = "4194304")]
        size: usize,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Snapshot {
            archive,
            class,
            snapshot_id,
        } => cmd_snapshot(&config, archive, &class, snapshot_id).await,
        Commands::Restore {
            snapshot_id,
            target,
        } => cmd_restore(&config, &snapshot_id, target).await,
        Commands::List => cmd_list(&config).await,
        Commands::Status { snapshot_id } => cmd_status(&config, &snapshot_id).await,
        Commands::Delete { snapshot_id } => cmd_delete(&config, &snapshot_id).await,
        Commands::Benchmark { count, size } => cmd_benchmark(&config, count, size).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parse a `--class` argument into a content class.
fn parse_content_class(s: &str) -> Result<ContentClass> {
    Ok(match s {
        "text" | "code" | "config" => ContentClass::Text,
        "log" => ContentClass::Log,
        "tabular" => ContentClass::Tabular,
        "weights" => ContentClass::NumericWeights(FloatDtype::Unknown),
        "weights-f16" => ContentClass::NumericWeights(FloatDtype::F16),
        "weights-bf16" => ContentClass::NumericWeights(FloatDtype::Bf16),
        "weights-f32" => ContentClass::NumericWeights(FloatDtype::F32),
        "opaque" | "binary" => ContentClass::Opaque,
        other => anyhow::bail!("unknown content class {other:?}"),
    })
}

/// Build the engine from configured S3 providers.
fn build_engine(config: &CliConfig) -> Result<SnapshotEngine> {
    if config.provider.is_empty() {
        anyhow::bail!(
            "no providers configured (add a [[provider]] table to {})",
            CliConfig::default_path()
                .unwrap_or_else(|| PathBuf::from("config.toml"))
                .display()
        );
    }

    let mut providers = Vec::with_capacity(config.provider.len());
    for section in &config.provider {
        let (access_key_id, secret_access_key) = section.credentials()?;
        let store = S3Store::new(S3StoreConfig {
            endpoint: section.endpoint.clone(),
            region: section.region.clone(),
            bucket: section.bucket.clone(),
            access_key_id,
            secret_access_key,
        });
        providers.push(Provider::new(
            section.name.clone(),
            Arc::new(store) as Arc<dyn ObjectStore>,
        ));
    }

    let transport = SnapshotTransport::new(
        providers,
        TransportConfig {
            placement: config.placement()?,
            retry: RetryPolicy::default(),
        },
    )?;

    Ok(SnapshotEngine::new(
        Arc::new(transport),
        EngineConfig {
            strategy: config.strategy()?,
            compress_workers: config.compress_workers(),
            transfer_workers: config.transfer_workers(),
            verify_artifact: config.verify_artifact(),
        },
    ))
}

// -----------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------

async fn cmd_snapshot(
    config: &CliConfig,
    archive: PathBuf,
    class: &str,
    snapshot_id: Option<String>,
) -> Result<()> {
    let engine = build_engine(config)?;
    let handle = engine
        .create_snapshot(SnapshotRequest {
            workspace: WorkspaceRef::new(archive),
            content_class: parse_content_class(class)?,
            snapshot_id: snapshot_id.map(SnapshotId::new),
        })
        .await?;

    println!("snapshot id:  {}", handle.snapshot_id);
    println!("original:     {}", human_bytes(handle.size_original));
    println!("compressed:   {}", human_bytes(handle.size_compressed));
    println!("ratio:        {:.2}x", handle.compression_ratio);
    println!("chunks:       {}", handle.num_chunks);
    Ok(())
}

async fn cmd_restore(config: &CliConfig, snapshot_id: &str, target: PathBuf) -> Result<()> {
    let engine = build_engine(config)?;
    let handle = engine
        .restore_snapshot(&SnapshotId::new(snapshot_id), &WorkspaceRef::new(target))
        .await?;

    println!("restored:     {}", handle.snapshot_id);
    println!(
        "download:     {:.2}s",
        handle.download_time.as_secs_f64()
    );
    println!(
        "decompress:   {:.2}s",
        handle.decompress_time.as_secs_f64()
    );
    Ok(())
}

async fn cmd_list(config: &CliConfig) -> Result<()> {
    let engine = build_engine(config)?;
    let ids = engine.list_snapshots().await?;
    if ids.is_empty() {
        println!("no snapshots");
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

async fn cmd_status(config: &CliConfig, snapshot_id: &str) -> Result<()> {
    let engine = build_engine(config)?;
    let manifest = engine
        .snapshot_manifest(&SnapshotId::new(snapshot_id))
        .await?;

    println!("snapshot id:  {}", manifest.snapshot_id);
    println!("created at:   {}", manifest.created_at);
    println!("strategy:     {}", manifest.compression);
    println!("chunk size:   {}", human_bytes(manifest.chunk_size));
    println!("chunks:       {}", manifest.num_chunks);
    println!("original:     {}", human_bytes(manifest.original_size));
    println!("compressed:   {}", human_bytes(manifest.compressed_size));
    println!("ratio:        {:.2}x", manifest.compression_ratio());
    Ok(())
}

async fn cmd_delete(config: &CliConfig, snapshot_id: &str) -> Result<()> {
    let engine = build_engine(config)?;
    engine.delete_snapshot(&SnapshotId::new(snapshot_id)).await?;
    println!("deleted {snapshot_id}");
    Ok(())
}

/// In-memory benchmark: snapshot + restore cycles over two striped
/// providers, reporting throughput and compression ratio.
async fn cmd_benchmark(config: &CliConfig, count: usize, size: usize) -> Result<()> {
    let providers = vec![
        Provider::new("bench-a", Arc::new(MemoryStore::new()) as Arc<dyn ObjectStore>),
        Provider::new("bench-b", Arc::new(MemoryStore::new()) as Arc<dyn ObjectStore>),
    ];
    let transport = SnapshotTransport::new(
        providers,
        TransportConfig {
            placement: PlacementPolicy::Striped,
            retry: RetryPolicy::default(),
        },
    )?;
    let engine = SnapshotEngine::new(
        Arc::new(transport),
        EngineConfig {
            strategy: Strategy::balanced_v1().with_chunk_size(1024 * 1024),
            compress_workers: config.compress_workers(),
            transfer_workers: config.transfer_workers(),
            verify_artifact: true,
        },
    );

    let dir = tempfile_dir()?;
    let archive = dir.join("bench-workspace.tar");
    tokio::fs::write(&archive, generate_bench_data(size)).await?;
    let total_bytes = count as u64 * size as u64;

    // --- Snapshot ---
    print!("Snapshotting {count} workspaces... ");
    let mut ratio = 1.0;
    let start = Instant::now();
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let handle = engine
            .create_snapshot(SnapshotRequest {
                workspace: WorkspaceRef::new(&archive),
                content_class: ContentClass::Opaque,
                snapshot_id: None,
            })
            .await?;
        ratio = handle.compression_ratio;
        ids.push(handle.snapshot_id);
    }
    let write_dur = start.elapsed();
    let write_mbs = total_bytes as f64 / write_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({write_mbs:.1} MB/s)", write_dur.as_secs_f64());

    // --- Restore ---
    print!("Restoring {count} workspaces... ");
    let start = Instant::now();
    for (i, id) in ids.iter().enumerate() {
        let target = dir.join(format!("restore-{i}.tar"));
        engine.restore_snapshot(id, &WorkspaceRef::new(target)).await?;
    }
    let read_dur = start.elapsed();
    let read_mbs = total_bytes as f64 / read_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({read_mbs:.1} MB/s)", read_dur.as_secs_f64());

    println!();
    println!("Summary:");
    println!("  Snapshot throughput: {write_mbs:.1} MB/s");
    println!("  Restore throughput:  {read_mbs:.1} MB/s");
    println!("  Compression ratio:   {ratio:.2}x");
    println!(
        "  Total data:          {:.1} MB",
        total_bytes as f64 / 1_048_576.0
    );

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

/// Create a unique scratch directory under the system temp dir.
fn tempfile_dir() -> Result<PathBuf> {
    use rand::RngCore;
    let mut suffix = [0u8; 4];
    rand::rng().fill_bytes(&mut suffix);
    let suffix: String = suffix.iter().map(|b| format!("{b:02x}")).collect();
    let dir = std::env::temp_dir().join(format!("torpor-bench-{suffix}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Generate deterministic test data for benchmarking.
fn generate_bench_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Format a byte count for humans.
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
