//! Grouping of listed series keys into file versions.

use std::collections::HashMap;
use std::sync::Arc;

use super::series::SeriesKey;
use crate::checksum::Sha256Digest;
use crate::error::BackendError;
use crate::meta::{BlockMeta, FileMeta};

/// Identity of one stored version: blocks agreeing on all four belong together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VersionKey {
    path: String,
    sha256: Sha256Digest,
    size: u64,
    block_size: u64,
}

#[derive(Debug)]
struct Version {
    file: Arc<FileMeta>,
    blocks: Vec<BlockMeta>,
}

/// Builds `BlockMeta` lists from a listing, keeping exactly one shared
/// `FileMeta` per version so each list can go straight to `download_file`.
#[derive(Debug, Default)]
pub struct FileVersions {
    index: HashMap<VersionKey, usize>,
    versions: Vec<Version>,
}

impl FileVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every key and add it.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, BackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut versions = FileVersions::new();
        for key in keys {
            versions.add(key.as_ref().parse()?)?;
        }
        Ok(versions)
    }

    /// Add one block. Fails if the key describes a block outside its file.
    pub fn add(&mut self, key: SeriesKey) -> Result<(), BackendError> {
        let bad = |reason: &str| BackendError::Parse {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.block_size == 0 {
            return Err(bad("block size must be positive"));
        }
        let vk = VersionKey {
            path: key.path.clone(),
            sha256: key.sha256,
            size: key.size,
            block_size: key.block_size,
        };
        let slot = match self.index.get(&vk) {
            Some(&slot) => slot,
            None => {
                self.versions.push(Version {
                    file: Arc::new(key.file_meta()),
                    blocks: Vec::new(),
                });
                self.index.insert(vk, self.versions.len() - 1);
                self.versions.len() - 1
            }
        };
        let version = &mut self.versions[slot];
        if key.index >= version.file.num_blocks() {
            return Err(bad("block index beyond end of file"));
        }
        let mut block = version.file.new_block_meta(key.index);
        block.sha256 = key.block_sha256;
        version.blocks.push(block);
        Ok(())
    }

    /// Number of distinct versions seen.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// One `FileMeta` per version, ordered by path then digest.
    pub fn files(&self) -> Vec<FileMeta> {
        let mut files: Vec<FileMeta> = self.versions.iter().map(|v| (*v.file).clone()).collect();
        files.sort_by(|a, b| a.path.cmp(&b.path).then(a.sha256.cmp(&b.sha256)));
        files
    }

    /// Blocks of the single version stored at `path`, sorted by index.
    ///
    /// With `want` set, only versions with that whole-file digest are
    /// considered. Versions holding the same content under different block
    /// sizes are one file: the smallest block size with a complete block set
    /// wins. Fails with `NotFound` if nothing matches, with
    /// `AmbiguousVersions` if distinct contents match, and with `Parse` if no
    /// candidate holds exactly the blocks `0..num_blocks`.
    pub fn into_blocks(self, path: &str, want: Option<&Sha256Digest>) -> Result<Vec<BlockMeta>, BackendError> {
        let mut matching: Vec<Version> = self
            .versions
            .into_iter()
            .filter(|v| v.file.path == path && want.map_or(true, |w| v.file.sha256 == *w))
            .collect();
        if matching.is_empty() {
            return Err(BackendError::NotFound(match want {
                Some(w) => format!("{path} with sha256 {}", hex::encode(w)),
                None => path.to_string(),
            }));
        }

        let mut contents: Vec<(Sha256Digest, u64)> =
            matching.iter().map(|v| (v.file.sha256, v.file.size)).collect();
        contents.sort();
        contents.dedup();
        if contents.len() > 1 {
            let mut candidates: Vec<String> = contents.iter().map(|(sha, _)| hex::encode(sha)).collect();
            candidates.dedup();
            return Err(BackendError::AmbiguousVersions {
                path: path.to_string(),
                candidates,
            });
        }

        matching.sort_by_key(|v| v.file.block_size);
        let mut incomplete = None;
        for mut version in matching {
            version.blocks.sort_by_key(|b| b.index);
            let expected = version.file.num_blocks();
            let complete = version.blocks.len() as u64 == expected
                && version.blocks.iter().enumerate().all(|(i, b)| b.index == i as u64);
            if complete {
                return Ok(version.blocks);
            }
            incomplete.get_or_insert(BackendError::Parse {
                key: path.to_string(),
                reason: format!(
                    "version {} (block size {}) has {} block entries, expected exactly indices 0..{}",
                    version.file.sha256_hex(),
                    version.file.block_size,
                    version.blocks.len(),
                    expected
                ),
            });
        }
        Err(incomplete.unwrap_or_else(|| BackendError::NotFound(path.to_string())))
    }
}
