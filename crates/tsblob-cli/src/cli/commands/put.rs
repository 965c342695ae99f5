//! `tsblob put` – upload a local file.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tsblob_core::config::TsblobConfig;
use tsblob_core::storage::PositionalReader;
use tsblob_core::volume::validate_path;
use tsblob_core::{Engine, FileMeta, InfluxVolume};

use super::progress;

pub async fn run_put(
    cfg: &TsblobConfig,
    local: &Path,
    remote: &str,
    block_size: Option<u64>,
) -> Result<()> {
    validate_path(remote)?;
    let block_size = block_size.unwrap_or(cfg.block_size);

    let source_path = local.to_path_buf();
    let remote_path = remote.to_string();
    let (source, file) = tokio::task::spawn_blocking(move || -> Result<(File, FileMeta)> {
        let f = File::open(&source_path)
            .with_context(|| format!("open {}", source_path.display()))?;
        let meta = FileMeta::from_reader(&f)
            .with_context(|| format!("read {}", source_path.display()))?
            .with_path(remote_path)
            .with_block_size(block_size)
            .with_time_now();
        Ok((f, meta))
    })
    .await??;

    if file.size == 0 {
        anyhow::bail!("{} is empty; nothing to upload", local.display());
    }
    tracing::info!(
        local = %local.display(),
        remote,
        size = file.size,
        block_size,
        sha256 = %file.sha256_hex(),
        "put"
    );

    let engine = Engine::from_config(&cfg.engine).context("failed to start worker pools")?;
    let volume = Arc::new(InfluxVolume::from_config(cfg)?);
    let source = Arc::new(source);
    let ctx = engine.upload_file(source.clone(), Arc::new(file), volume)?;
    progress::wait_with_progress(&ctx, "put").await?;
    progress::ensure_success(&ctx, "upload")?;

    // Block digests cover what each worker read, not the file as hashed up front.
    let file = Arc::clone(ctx.file());
    tokio::task::spawn_blocking(move || verify_source(&source, &file))
        .await?
        .with_context(|| format!("{} changed during upload; stored copy is unusable", local.display()))?;
    progress::report(&ctx, "uploaded");
    println!("sha256 {}", ctx.file().sha256_hex());
    Ok(())
}

/// Stream `source` from offset 0 and compare it with the digest recorded in `file`.
fn verify_source(source: &File, file: &FileMeta) -> Result<()> {
    file.compare_sha256_against(PositionalReader::new(source))?;
    Ok(())
}
