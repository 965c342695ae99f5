//! Whole-file metadata.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::block::BlockMeta;
use super::range::{block_count, block_range, BlockRange};
use crate::checksum::{parse_sha256_hex, sha256_reader, Sha256Digest};
use crate::error::TransferError;

/// Metadata for one stored version of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    /// Remote path of the file.
    pub path: String,
    /// SHA-256 of the entire content.
    pub sha256: Sha256Digest,
    /// Size of every block but the last.
    pub block_size: u64,
    /// Total size in bytes (need not be a multiple of `block_size`).
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub time: i64,
}

impl FileMeta {
    /// Stream `r` to EOF and return a `FileMeta` with `size` and `sha256` set.
    /// Path, block size and time are left for the caller to fill in.
    pub fn from_reader<R: Read>(r: R) -> io::Result<Self> {
        let (sha256, size) = sha256_reader(r)?;
        Ok(FileMeta {
            sha256,
            size,
            ..FileMeta::default()
        })
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// Stamp with the current wall-clock time (second resolution).
    pub fn with_time_now(self) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.with_time(now)
    }

    /// Check the invariants the block math relies on.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.block_size == 0 {
            return Err(TransferError::Precondition(format!(
                "{}: block size must be positive",
                self.path
            )));
        }
        Ok(())
    }

    /// `ceil(size / block_size)`. Panics when `block_size` is 0.
    pub fn num_blocks(&self) -> u64 {
        block_count(self.size, self.block_size)
    }

    /// Byte range of block `index`.
    pub fn block_range(&self, index: u64) -> BlockRange {
        block_range(self.size, self.block_size, index)
    }

    /// Metadata for block `index`, sharing this `FileMeta`. The block's
    /// digest is zero until set.
    ///
    /// Panics if `index >= num_blocks()`.
    pub fn new_block_meta(self: &Arc<Self>, index: u64) -> BlockMeta {
        let range = self.block_range(index);
        BlockMeta::new(Arc::clone(self), index, range)
    }

    /// Every block of the file in index order.
    pub fn block_metas(self: &Arc<Self>) -> Vec<BlockMeta> {
        (0..self.num_blocks())
            .map(|i| self.new_block_meta(i))
            .collect()
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    pub fn set_sha256_hex(&mut self, s: &str) -> Result<(), hex::FromHexError> {
        self.sha256 = parse_sha256_hex(s)?;
        Ok(())
    }

    /// Hash `r` and fail unless it holds exactly `size` bytes with the
    /// file's digest. Used as the final gate after a download.
    pub fn compare_sha256_against<R: Read>(&self, r: R) -> Result<(), TransferError> {
        super::compare_sha256(r, &self.sha256, self.size)
    }
}
