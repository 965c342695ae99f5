//! In-process volume: stores each block as Z85 text under its series key,
//! exactly as the time-series backend lays it out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::series::{validate_path, SeriesKey};
use super::versions::FileVersions;
use super::{decode_block, BlockLister};
use crate::engine::{BlockDownloader, BlockUploader};
use crate::error::BackendError;
use crate::meta::{BlockMeta, FileMeta};
use crate::z85;

#[derive(Debug, Default)]
struct Inner {
    /// Series key → encoded payload.
    points: BTreeMap<String, String>,
    /// (path, index) → error message returned by every call touching that block.
    faults: HashMap<(String, u64), String>,
}

/// Thread-safe in-memory block store.
#[derive(Debug, Default)]
pub struct MemoryVolume {
    inner: Mutex<Inner>,
}

impl MemoryVolume {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_fault(inner: &Inner, block: &BlockMeta) -> Result<(), BackendError> {
        match inner.faults.get(&(block.path().to_string(), block.index)) {
            Some(msg) => Err(BackendError::Other(msg.clone())),
            None => Ok(()),
        }
    }

    /// Number of stored blocks across all files.
    pub fn len(&self) -> usize {
        self.lock().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().points.is_empty()
    }

    /// Encoded payload of every stored block at `path` with `index`.
    pub fn stored_text(&self, path: &str, index: u64) -> Vec<String> {
        self.lock()
            .points
            .iter()
            .filter(|(k, _)| matches!(k.parse::<SeriesKey>(), Ok(sk) if sk.path == path && sk.index == index))
            .map(|(_, z)| z.clone())
            .collect()
    }

    /// Flip the first byte of every stored copy of block `index` at `path`,
    /// keeping its series key (and so its recorded digest). Returns how many
    /// copies were altered.
    pub fn corrupt_block(&self, path: &str, index: u64) -> usize {
        let mut inner = self.lock();
        let mut altered = 0;
        for (key, z) in inner.points.iter_mut() {
            let Ok(sk) = key.parse::<SeriesKey>() else {
                continue;
            };
            if sk.path != path || sk.index != index {
                continue;
            }
            let Ok(mut raw) = z85::decode(z.as_bytes()) else {
                continue;
            };
            if let Some(first) = raw.first_mut() {
                *first ^= 0xFF;
                *z = z85::encode_padded(&raw);
                altered += 1;
            }
        }
        altered
    }

    /// Make every upload and download of block `index` at `path` fail with `msg`.
    pub fn fail_block(&self, path: &str, index: u64, msg: impl Into<String>) {
        self.lock()
            .faults
            .insert((path.to_string(), index), msg.into());
    }

    /// Remove all stored blocks of `path`.
    pub fn remove(&self, path: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.points.len();
        inner
            .points
            .retain(|k, _| !matches!(k.parse::<SeriesKey>(), Ok(sk) if sk.path == path));
        before - inner.points.len()
    }

    fn keys_matching(&self, pred: impl Fn(&str) -> bool) -> Vec<String> {
        self.lock()
            .points
            .keys()
            .filter(|k| k.split(',').next().is_some_and(&pred))
            .cloned()
            .collect()
    }
}

impl BlockUploader for MemoryVolume {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError> {
        validate_path(block.path())?;
        let key = SeriesKey::from_block(block).to_string();
        let text = z85::encode_padded(data);
        let mut inner = self.lock();
        Self::check_fault(&inner, block)?;
        inner.points.insert(key, text);
        Ok(())
    }
}

impl BlockDownloader for MemoryVolume {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        let key = SeriesKey::from_block(block).to_string();
        let inner = self.lock();
        Self::check_fault(&inner, block)?;
        let text = inner
            .points
            .get(&key)
            .ok_or_else(|| BackendError::NotFound(key.clone()))?;
        decode_block(text.as_bytes(), block)
    }
}

impl BlockLister for MemoryVolume {
    fn list_versions(&self, path: &str) -> Result<FileVersions, BackendError> {
        validate_path(path)?;
        FileVersions::from_keys(self.keys_matching(|p| p == path))
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<FileMeta>, BackendError> {
        Ok(FileVersions::from_keys(self.keys_matching(|p| p.starts_with(prefix)))?.files())
    }
}
