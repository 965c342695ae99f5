//! Concurrent offset writer for download destination files.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{write_full_at, PositionalReader, ReadAt, WriteAt};

/// Writer for a temp download file. Safe to clone and share between workers;
/// each write is independent (pwrite-style).
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Write all of `data` at `offset`.
    pub fn write_all_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let n = write_full_at(self.file.as_ref(), data, offset).context("storage write_at failed")?;
        if n != data.len() {
            anyhow::bail!("short write: {} of {}", n, data.len());
        }
        Ok(())
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("storage sync failed")?;
        Ok(())
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// A sequential reader over the temp file from offset 0, for the
    /// whole-file checksum gate.
    pub fn reader(&self) -> impl io::Read + '_ {
        PositionalReader::new(self.file.as_ref())
    }

    /// Atomically rename the temp file to the final path. Consumes the writer and closes the file.
    /// Call `sync` before this if you need durability. Fails if `final_path` is on a different filesystem.
    pub fn finalize(self, final_path: &Path) -> Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);

        std::fs::rename(&temp_path, final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                final_path.display()
            )
        })?;
        Ok(())
    }

    /// Close and delete the temp file after a failed transfer.
    pub fn discard(self) -> Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        std::fs::remove_file(&temp_path)
            .with_context(|| format!("failed to remove {}", temp_path.display()))?;
        Ok(())
    }
}

impl WriteAt for StorageWriter {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        self.file.as_ref().write_at(buf, offset)
    }
}

impl ReadAt for StorageWriter {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.as_ref().read_at(buf, offset)
    }
}
