//! Per-block metadata.

use std::io::Read;
use std::sync::Arc;

use super::file::FileMeta;
use super::range::BlockRange;
use crate::checksum::{parse_sha256_hex, sha256_bytes, sha256_reader, Sha256Digest};
use crate::error::TransferError;

/// One contiguous byte range `[offset, offset + exp_size)` of a file.
///
/// Many blocks share one read-only `FileMeta`. The block's own digest is set
/// independently: by hashing its bytes before upload, or from a listing.
#[derive(Debug, Clone)]
pub struct BlockMeta {
    file: Arc<FileMeta>,
    pub index: u64,
    pub sha256: Sha256Digest,
    offset: u64,
    exp_size: u64,
}

impl BlockMeta {
    pub(super) fn new(file: Arc<FileMeta>, index: u64, range: BlockRange) -> Self {
        BlockMeta {
            file,
            index,
            sha256: [0u8; 32],
            offset: range.start,
            exp_size: range.len(),
        }
    }

    pub fn file(&self) -> &Arc<FileMeta> {
        &self.file
    }

    /// Path of the parent file.
    pub fn path(&self) -> &str {
        &self.file.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn exp_size(&self) -> u64 {
        self.exp_size
    }

    pub fn range(&self) -> BlockRange {
        BlockRange {
            start: self.offset,
            end: self.offset + self.exp_size,
        }
    }

    /// True if both blocks reference the same `FileMeta` instance.
    pub fn same_file(&self, other: &BlockMeta) -> bool {
        Arc::ptr_eq(&self.file, &other.file)
    }

    /// Hash everything `r` yields into this block's digest. Fails if `r` did
    /// not hold exactly `exp_size` bytes; the digest is left untouched then.
    pub fn set_sha256<R: Read>(&mut self, r: R) -> Result<(), TransferError> {
        let (digest, n) = sha256_reader(r)?;
        if n != self.exp_size {
            return Err(TransferError::ShortRead {
                expected: self.exp_size,
                actual: n,
            });
        }
        self.sha256 = digest;
        Ok(())
    }

    /// Like [`set_sha256`](Self::set_sha256) over bytes already in memory.
    pub fn set_sha256_bytes(&mut self, data: &[u8]) -> Result<(), TransferError> {
        if data.len() as u64 != self.exp_size {
            return Err(TransferError::ShortRead {
                expected: self.exp_size,
                actual: data.len() as u64,
            });
        }
        self.sha256 = sha256_bytes(data);
        Ok(())
    }

    /// Recompute the digest over `r` and compare it with the stored one.
    pub fn compare_sha256_against<R: Read>(&self, r: R) -> Result<(), TransferError> {
        super::compare_sha256(r, &self.sha256, self.exp_size)
    }

    /// Verify an in-memory copy of the block.
    pub fn verify_bytes(&self, data: &[u8]) -> Result<(), TransferError> {
        self.compare_sha256_against(data)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    pub fn set_sha256_hex(&mut self, s: &str) -> Result<(), hex::FromHexError> {
        self.sha256 = parse_sha256_hex(s)?;
        Ok(())
    }
}
