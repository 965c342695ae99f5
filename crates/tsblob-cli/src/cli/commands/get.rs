//! `tsblob get` – download a stored file into a new local file.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tsblob_core::checksum::parse_sha256_hex;
use tsblob_core::config::TsblobConfig;
use tsblob_core::storage::{temp_path, StorageWriter, StorageWriterBuilder};
use tsblob_core::{BlockLister, Engine, InfluxVolume};

use super::progress;

pub async fn run_get(
    cfg: &TsblobConfig,
    remote: &str,
    local: &Path,
    sha256: Option<&str>,
) -> Result<()> {
    if local.exists() {
        anyhow::bail!("{} already exists", local.display());
    }
    let want = sha256
        .map(parse_sha256_hex)
        .transpose()
        .context("--sha256 must be 64 hex characters")?;

    let volume = Arc::new(InfluxVolume::from_config(cfg)?);
    let blocks = {
        let volume = Arc::clone(&volume);
        let remote = remote.to_string();
        tokio::task::spawn_blocking(move || match want {
            Some(w) => volume.list_blocks_for(&remote, &w),
            None => volume.list_blocks(&remote),
        })
        .await??
    };
    let file = Arc::clone(
        blocks
            .first()
            .with_context(|| format!("{remote} has no blocks"))?
            .file(),
    );
    tracing::info!(
        remote,
        local = %local.display(),
        size = file.size,
        blocks = blocks.len(),
        sha256 = %file.sha256_hex(),
        "get"
    );

    let engine = Engine::from_config(&cfg.engine).context("failed to start worker pools")?;

    let tp = temp_path(local);
    let mut builder = StorageWriterBuilder::create_new(&tp)?;
    let preallocated = builder.preallocate(file.size);
    let writer = builder.build();
    or_discard(preallocated, &writer)?;

    let ctx = or_discard(
        engine
            .download_file(Arc::new(writer.clone()), blocks, volume)
            .map_err(anyhow::Error::from),
        &writer,
    )?;
    let finished = progress::wait_with_progress(&ctx, "get")
        .await
        .and_then(|()| progress::ensure_success(&ctx, "download"));
    or_discard(finished, &writer)?;

    let verified = {
        let writer = writer.clone();
        let file = Arc::clone(&file);
        tokio::task::spawn_blocking(move || -> Result<()> {
            writer.sync()?;
            file.compare_sha256_against(writer.reader())?;
            Ok(())
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r)
        .with_context(|| format!("{remote} failed whole-file verification"))
    };
    or_discard(verified, &writer)?;

    writer.finalize(local)?;
    progress::report(&ctx, "downloaded");
    Ok(())
}

/// Pass `result` through, removing the temp file first if it is an error.
fn or_discard<T>(result: Result<T>, writer: &StorageWriter) -> Result<T> {
    if result.is_err() {
        discard(writer.clone());
    }
    result
}

fn discard(writer: StorageWriter) {
    let path = writer.temp_path().to_path_buf();
    if let Err(e) = writer.discard() {
        tracing::warn!(path = %path.display(), error = %e, "could not remove temp file");
    }
}
