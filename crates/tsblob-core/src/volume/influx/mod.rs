//! InfluxDB 1.x volume.
//!
//! Every block becomes one point: measurement = file path, tags = block and
//! file identity (see [`SeriesKey`](crate::volume::SeriesKey)), field `z` =
//! Z85 payload, timestamp = the file's upload time. Listing reads series
//! keys back with `SHOW SERIES`; no field data is scanned.

mod client;
mod protocol;

pub use client::{InfluxClient, QueryOpts, QueryResponse, Series, StatementResult, WriteOpts};
pub use protocol::{block_line, select_block, show_series, show_series_prefix};

use super::series::validate_path;
use super::versions::FileVersions;
use super::{decode_block, BlockLister};
use crate::config::TsblobConfig;
use crate::engine::{BlockDownloader, BlockUploader};
use crate::error::BackendError;
use crate::meta::{BlockMeta, FileMeta};

/// Block store backed by an InfluxDB database.
#[derive(Debug, Clone)]
pub struct InfluxVolume {
    client: InfluxClient,
    database: String,
    retention_policy: Option<String>,
}

impl InfluxVolume {
    pub fn new(client: InfluxClient, database: impl Into<String>, retention_policy: Option<String>) -> Self {
        InfluxVolume {
            client,
            database: database.into(),
            retention_policy: retention_policy.filter(|rp| !rp.is_empty()),
        }
    }

    pub fn from_config(cfg: &TsblobConfig) -> Result<Self, BackendError> {
        let client = InfluxClient::from_config(&cfg.influx_url, &cfg.http)?;
        Ok(Self::new(client, cfg.database.clone(), cfg.retention_policy.clone()))
    }

    pub fn client(&self) -> &InfluxClient {
        &self.client
    }

    fn query_opts(&self) -> QueryOpts<'_> {
        QueryOpts {
            database: &self.database,
            retention_policy: self.retention_policy.as_deref(),
        }
    }

    fn series_keys(&self, q: &str) -> Result<Vec<String>, BackendError> {
        let result = self.client.query(q, &self.query_opts())?;
        protocol::series_keys(result)
    }
}

impl BlockUploader for InfluxVolume {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError> {
        validate_path(block.path())?;
        let line = protocol::block_line(data, block);
        self.client.write(
            &line,
            &WriteOpts {
                database: &self.database,
                retention_policy: self.retention_policy.as_deref(),
                consistency: Some("all"),
            },
        )
    }
}

impl BlockDownloader for InfluxVolume {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        validate_path(block.path())?;
        let result = self
            .client
            .query(&protocol::select_block(block), &self.query_opts())?;
        let text = protocol::block_text(result, block)?;
        decode_block(text.as_bytes(), block)
    }
}

impl BlockLister for InfluxVolume {
    fn list_versions(&self, path: &str) -> Result<FileVersions, BackendError> {
        validate_path(path)?;
        let keys = self.series_keys(&protocol::show_series(path))?;
        tracing::debug!(path, series = keys.len(), "listed blocks");
        FileVersions::from_keys(keys)
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<FileMeta>, BackendError> {
        let keys = self.series_keys(&protocol::show_series_prefix(prefix))?;
        Ok(FileVersions::from_keys(keys)?.files())
    }
}
