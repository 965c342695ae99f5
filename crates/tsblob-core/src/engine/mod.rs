//! Concurrent block transfer engine.
//!
//! An `Engine` owns two fixed pools of worker threads, one for uploads and
//! one for downloads. `upload_file` / `download_file` build one
//! [`BlockTransferContext`] per block, hand the tasks to a short-lived feeder
//! thread and return immediately; the feeder pushes tasks in index order into
//! a bounded queue (capacity = worker count) and blocks while it is full.
//!
//! Every block ends with a typed [`BlockOutcome`]: a failing block never
//! aborts its siblings and never panics the worker. Callers `wait()` on the
//! returned [`FileTransferContext`], inspect `failures()`, then check the
//! whole-file digest themselves.

mod context;
mod worker;

#[cfg(test)]
mod tests;

pub use context::{BlockOutcome, BlockStatus, BlockTransferContext, FileTransferContext, TransferStats};

use std::io;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{BackendError, TransferError};
use crate::meta::{BlockMeta, FileMeta};
use crate::storage::{read_full_at, write_full_at, ReadAt, WriteAt};
use worker::{Pool, Task};

/// Upload workers used when zero is requested.
pub const DEFAULT_UPLOAD_WORKERS: usize = 10;
/// Download workers used when zero is requested.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 25;

/// Stores one block. Called concurrently from upload workers.
pub trait BlockUploader: Send + Sync {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError>;
}

/// Fetches one block's bytes. Called concurrently from download workers.
pub trait BlockDownloader: Send + Sync {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError>;
}

/// Worker pools for block uploads and downloads.
pub struct Engine {
    uploads: Pool,
    downloads: Pool,
}

impl Engine {
    /// Spawn `uploaders` upload workers and `downloaders` download workers.
    /// Zero selects the defaults (10 and 25).
    pub fn new(uploaders: usize, downloaders: usize) -> io::Result<Self> {
        let uploaders = if uploaders == 0 { DEFAULT_UPLOAD_WORKERS } else { uploaders };
        let downloaders = if downloaders == 0 { DEFAULT_DOWNLOAD_WORKERS } else { downloaders };
        Ok(Engine {
            uploads: Pool::spawn("tsblob-up", uploaders)?,
            downloads: Pool::spawn("tsblob-down", downloaders)?,
        })
    }

    pub fn from_config(cfg: &EngineConfig) -> io::Result<Self> {
        Self::new(cfg.upload_workers, cfg.download_workers)
    }

    /// `(upload workers, download workers)`.
    pub fn num_workers(&self) -> (usize, usize) {
        (self.uploads.workers(), self.downloads.workers())
    }

    /// Upload every block of `file`, reading its bytes from `source`.
    ///
    /// Fails synchronously only if `file` has a zero block size or the feeder
    /// thread cannot be spawned; per-block failures land in the returned context.
    pub fn upload_file(
        &self,
        source: Arc<dyn ReadAt>,
        file: Arc<FileMeta>,
        uploader: Arc<dyn BlockUploader>,
    ) -> Result<FileTransferContext, TransferError> {
        file.validate()?;
        let contexts: Vec<Arc<BlockTransferContext>> = file
            .block_metas()
            .into_iter()
            .map(|b| Arc::new(BlockTransferContext::new(b)))
            .collect();
        tracing::info!(
            path = %file.path,
            size = file.size,
            blocks = contexts.len(),
            "upload started"
        );
        let tasks = contexts
            .iter()
            .map(|ctx| {
                let source = Arc::clone(&source);
                let uploader = Arc::clone(&uploader);
                Task::new(Arc::clone(ctx), move |block: &mut BlockMeta| {
                    upload_block(source.as_ref(), block, uploader.as_ref())
                })
            })
            .collect();
        self.uploads.submit(tasks)?;
        Ok(FileTransferContext::new(file, contexts))
    }

    /// Download `blocks` into `destination` at their offsets.
    ///
    /// `blocks` must be non-empty and all share one `FileMeta` instance.
    /// Each block is verified against its digest after it is written.
    pub fn download_file(
        &self,
        destination: Arc<dyn WriteAt>,
        blocks: Vec<BlockMeta>,
        downloader: Arc<dyn BlockDownloader>,
    ) -> Result<FileTransferContext, TransferError> {
        let Some(first) = blocks.first() else {
            return Err(TransferError::Precondition("no blocks to download".into()));
        };
        if let Some(other) = blocks.iter().find(|b| !b.same_file(first)) {
            return Err(TransferError::Precondition(format!(
                "block {} belongs to a different file than block {}",
                other.index, first.index
            )));
        }
        let file = Arc::clone(first.file());
        let contexts: Vec<Arc<BlockTransferContext>> = blocks
            .into_iter()
            .map(|b| Arc::new(BlockTransferContext::new(b)))
            .collect();
        tracing::info!(
            path = %file.path,
            size = file.size,
            blocks = contexts.len(),
            "download started"
        );
        let tasks = contexts
            .iter()
            .map(|ctx| {
                let destination = Arc::clone(&destination);
                let downloader = Arc::clone(&downloader);
                Task::new(Arc::clone(ctx), move |block: &mut BlockMeta| {
                    download_block(destination.as_ref(), block, downloader.as_ref())
                })
            })
            .collect();
        self.downloads.submit(tasks)?;
        Ok(FileTransferContext::new(file, contexts))
    }
}

fn block_len(block: &BlockMeta) -> Result<usize, TransferError> {
    usize::try_from(block.exp_size()).map_err(|_| {
        TransferError::Precondition(format!(
            "block {} of {} bytes does not fit in memory",
            block.index,
            block.exp_size()
        ))
    })
}

/// Read `block`'s byte range from `source`, hash it into `block.sha256` and
/// hand it to `uploader`.
pub fn upload_block<R, U>(source: &R, block: &mut BlockMeta, uploader: &U) -> Result<(), TransferError>
where
    R: ReadAt + ?Sized,
    U: BlockUploader + ?Sized,
{
    let mut buf = vec![0u8; block_len(block)?];
    let n = read_full_at(source, &mut buf, block.offset())?;
    if n != buf.len() {
        return Err(TransferError::ShortRead {
            expected: block.exp_size(),
            actual: n as u64,
        });
    }
    block.set_sha256_bytes(&buf)?;
    uploader.upload_block(&buf, block)?;
    Ok(())
}

/// Fetch `block` through `downloader`, write it to `destination` at its
/// offset, then verify the bytes against `block.sha256`.
pub fn download_block<W, D>(destination: &W, block: &BlockMeta, downloader: &D) -> Result<(), TransferError>
where
    W: WriteAt + ?Sized,
    D: BlockDownloader + ?Sized,
{
    let data = downloader.download_block(block)?;
    if data.len() as u64 != block.exp_size() {
        return Err(TransferError::ShortRead {
            expected: block.exp_size(),
            actual: data.len() as u64,
        });
    }
    let n = write_full_at(destination, &data, block.offset())?;
    if n != data.len() {
        return Err(TransferError::ShortWrite {
            expected: block.exp_size(),
            actual: n as u64,
        });
    }
    block.verify_bytes(&data)
}
