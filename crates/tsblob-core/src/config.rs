use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Worker pool sizes (`[engine]` section). Zero selects the built-in default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent block uploads.
    pub upload_workers: usize,
    /// Concurrent block downloads.
    pub download_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            upload_workers: crate::engine::DEFAULT_UPLOAD_WORKERS,
            download_workers: crate::engine::DEFAULT_DOWNLOAD_WORKERS,
        }
    }
}

/// HTTP client timeouts (`[http]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, covering the transfer of one block.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 300,
        }
    }
}

/// Global configuration loaded from `~/.config/tsblob/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsblobConfig {
    /// Base URL of the InfluxDB HTTP API.
    pub influx_url: String,
    /// Database holding the blocks.
    pub database: String,
    /// Retention policy for writes and queries; server default when unset.
    #[serde(default)]
    pub retention_policy: Option<String>,
    /// Block size in bytes for new uploads.
    pub block_size: u64,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for TsblobConfig {
    fn default() -> Self {
        Self {
            influx_url: "http://localhost:8086".to_string(),
            database: "blob".to_string(),
            retention_policy: None,
            block_size: 1024,
            engine: EngineConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tsblob")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TsblobConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<TsblobConfig> {
    if !path.exists() {
        let default_cfg = TsblobConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TsblobConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    if cfg.block_size == 0 {
        anyhow::bail!("{}: block_size must be positive", path.display());
    }
    Ok(cfg)
}
