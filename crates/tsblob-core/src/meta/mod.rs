//! File and block metadata: how a file is split into blocks and how each
//! block (and the whole file) is checked against its SHA-256.
//!
//! A `FileMeta` is built once by hashing the full content, then shared
//! read-only through an `Arc` by every `BlockMeta` derived from it.

mod block;
mod file;
mod range;

pub use block::BlockMeta;
pub use file::FileMeta;
pub use range::{block_count, block_range, plan_blocks, BlockRange};

use crate::checksum::{sha256_reader, Sha256Digest};
use crate::error::TransferError;
use std::io::Read;

/// Hash everything `r` yields and compare against `expected`, requiring
/// exactly `exp_size` bytes.
fn compare_sha256<R: Read>(r: R, expected: &Sha256Digest, exp_size: u64) -> Result<(), TransferError> {
    let (actual, n) = sha256_reader(r)?;
    if n != exp_size {
        return Err(TransferError::ShortRead {
            expected: exp_size,
            actual: n,
        });
    }
    if actual != *expected {
        return Err(TransferError::ChecksumMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(())
}
