//! Block stores.
//!
//! A volume implements the engine's [`BlockUploader`] and [`BlockDownloader`]
//! plus [`BlockLister`], which turns stored series keys back into the
//! `BlockMeta` lists a download needs.
//!
//! [`BlockUploader`]: crate::engine::BlockUploader
//! [`BlockDownloader`]: crate::engine::BlockDownloader

pub mod influx;
mod memory;
mod series;
mod versions;

pub use influx::{InfluxClient, InfluxVolume};
pub use memory::MemoryVolume;
pub use series::{validate_path, SeriesKey};
pub use versions::FileVersions;

use crate::checksum::Sha256Digest;
use crate::error::BackendError;
use crate::meta::{BlockMeta, FileMeta};
use crate::z85;

/// Listing side of a volume.
pub trait BlockLister: Send + Sync {
    /// Every stored version at exactly `path`, grouped.
    fn list_versions(&self, path: &str) -> Result<FileVersions, BackendError>;

    /// One `FileMeta` per stored version whose path starts with `prefix`.
    fn list_files(&self, prefix: &str) -> Result<Vec<FileMeta>, BackendError>;

    /// Blocks of the file at `path`, sorted by index and sharing one `FileMeta`.
    /// Fails with `AmbiguousVersions` when more than one version is stored.
    fn list_blocks(&self, path: &str) -> Result<Vec<BlockMeta>, BackendError> {
        self.list_versions(path)?.into_blocks(path, None)
    }

    /// Blocks of the version of `path` whose whole-file digest is `sha256`.
    fn list_blocks_for(&self, path: &str, sha256: &Sha256Digest) -> Result<Vec<BlockMeta>, BackendError> {
        self.list_versions(path)?.into_blocks(path, Some(sha256))
    }
}

/// Decode a stored Z85 payload back to exactly `block.exp_size()` bytes.
pub(crate) fn decode_block(text: &[u8], block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
    let exp_size = usize::try_from(block.exp_size()).map_err(|_| {
        BackendError::Other(format!(
            "{} block {} of {} bytes does not fit in memory",
            block.path(),
            block.index,
            block.exp_size()
        ))
    })?;
    Ok(z85::decode_exact(text, exp_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tail_block() -> BlockMeta {
        let fm = Arc::new(
            FileMeta::from_reader(&b"abcdefghij"[..])
                .unwrap()
                .with_path("/f")
                .with_block_size(4),
        );
        fm.new_block_meta(2)
    }

    #[test]
    fn decode_block_strips_padding_to_block_size() {
        let block = tail_block();
        let text = z85::encode_padded(b"ij");
        assert_eq!(decode_block(text.as_bytes(), &block).unwrap(), b"ij");
    }

    #[test]
    fn decode_block_rejects_payload_of_other_size() {
        let block = tail_block();
        let text = z85::encode_padded(b"abcdefgh");
        assert!(matches!(
            decode_block(text.as_bytes(), &block),
            Err(BackendError::Codec(_))
        ));
    }
}
