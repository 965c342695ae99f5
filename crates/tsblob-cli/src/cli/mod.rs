//! CLI for tsblob.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tsblob_core::config::{self, TsblobConfig};

use commands::{run_checksum, run_get, run_ls, run_put};

/// Top-level CLI for tsblob.
#[derive(Debug, Parser)]
#[command(name = "tsblob")]
#[command(about = "tsblob: store files as checksummed blocks in InfluxDB", long_about = None)]
pub struct Cli {
    /// InfluxDB HTTP API base URL (overrides config).
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Database holding the blocks (overrides config).
    #[arg(long, global = true, value_name = "NAME")]
    pub database: Option<String>,

    /// Retention policy for reads and writes (overrides config).
    #[arg(long, global = true, value_name = "RP")]
    pub retention_policy: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a local file.
    Put {
        /// Local file to read.
        local: PathBuf,
        /// Remote path to store it under.
        remote: String,
        /// Block size in bytes (default from config).
        #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
        block_size: Option<u64>,
    },

    /// Download a stored file. The local path must not exist yet.
    Get {
        /// Remote path of the file.
        remote: String,
        /// Local destination.
        local: PathBuf,
        /// Pick one version by its SHA-256 when several are stored.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// List stored files.
    Ls {
        /// Only files whose path starts with this prefix.
        prefix: Option<String>,
    },

    /// Compute SHA-256 of a local file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, cfg: &mut TsblobConfig) {
        if let Some(url) = &self.url {
            cfg.influx_url = url.clone();
        }
        if let Some(db) = &self.database {
            cfg.database = db.clone();
        }
        if let Some(rp) = &self.retention_policy {
            cfg.retention_policy = Some(rp.clone());
        }
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Checksum { path } = &cli.command {
            return run_checksum(path).await;
        }

        let mut cfg = config::load_or_init()?;
        cli.apply_overrides(&mut cfg);
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Put {
                local,
                remote,
                block_size,
            } => run_put(&cfg, &local, &remote, block_size).await?,
            CliCommand::Get {
                remote,
                local,
                sha256,
            } => run_get(&cfg, &remote, &local, sha256.as_deref()).await?,
            CliCommand::Ls { prefix } => run_ls(&cfg, prefix.as_deref().unwrap_or("")).await?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
