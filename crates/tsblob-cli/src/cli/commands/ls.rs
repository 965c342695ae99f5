//! `tsblob ls` – list stored files.

use anyhow::Result;
use tsblob_core::config::TsblobConfig;
use tsblob_core::{BlockLister, InfluxVolume};

pub async fn run_ls(cfg: &TsblobConfig, prefix: &str) -> Result<()> {
    let volume = InfluxVolume::from_config(cfg)?;
    let prefix = prefix.to_string();
    let files = tokio::task::spawn_blocking(move || volume.list_files(&prefix)).await??;
    if files.is_empty() {
        println!("No files stored.");
        return Ok(());
    }
    println!("{:<12} {:<8} {:<64} {}", "SIZE", "BLOCK", "SHA256", "PATH");
    for f in files {
        println!(
            "{:<12} {:<8} {:<64} {}",
            f.size,
            f.block_size,
            f.sha256_hex(),
            f.path
        );
    }
    Ok(())
}
