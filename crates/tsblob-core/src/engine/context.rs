//! Per-call transfer contexts: one per block plus a file-level view over them.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{ErrorKind, TransferError};
use crate::meta::{BlockMeta, FileMeta};

/// Lifecycle of one block within a transfer. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Pending,
    InFlight,
    Done,
}

/// Result of one block transfer, recorded by the worker that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Success,
    Failed { kind: ErrorKind, detail: String },
}

impl BlockOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BlockOutcome::Success)
    }

    pub(crate) fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        BlockOutcome::Failed {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<&Result<(), TransferError>> for BlockOutcome {
    fn from(r: &Result<(), TransferError>) -> Self {
        match r {
            Ok(()) => BlockOutcome::Success,
            Err(e) => BlockOutcome::failed(e.kind(), e.to_string()),
        }
    }
}

#[derive(Debug)]
struct BlockState {
    block: BlockMeta,
    status: BlockStatus,
    started: Option<Instant>,
    finished: Option<Instant>,
    outcome: Option<BlockOutcome>,
}

/// Tracks one block of a file transfer. Completion is signalled once and
/// observed by any number of waiters.
#[derive(Debug)]
pub struct BlockTransferContext {
    state: Mutex<BlockState>,
    done: Condvar,
}

impl BlockTransferContext {
    pub(crate) fn new(block: BlockMeta) -> Self {
        BlockTransferContext {
            state: Mutex::new(BlockState {
                block,
                status: BlockStatus::Pending,
                started: None,
                finished: None,
                outcome: None,
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BlockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The block this context tracks. After an upload its digest holds the
    /// SHA-256 of the bytes that were sent.
    pub fn block(&self) -> BlockMeta {
        self.lock().block.clone()
    }

    pub fn index(&self) -> u64 {
        self.lock().block.index
    }

    pub fn status(&self) -> BlockStatus {
        self.lock().status
    }

    /// Non-blocking completion check.
    pub fn done(&self) -> bool {
        self.lock().status == BlockStatus::Done
    }

    /// Block until the transfer finished, then return its outcome.
    pub fn wait(&self) -> BlockOutcome {
        let guard = self.lock();
        let guard = self
            .done
            .wait_while(guard, |s| s.outcome.is_none())
            .unwrap_or_else(|e| e.into_inner());
        guard.outcome.clone().unwrap_or(BlockOutcome::Success)
    }

    /// Outcome if done, `None` while pending or in flight.
    pub fn outcome(&self) -> Option<BlockOutcome> {
        self.lock().outcome.clone()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.lock().started
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.lock().finished
    }

    /// Time spent in flight, once finished.
    pub fn elapsed(&self) -> Option<Duration> {
        let s = self.lock();
        Some(s.finished?.saturating_duration_since(s.started?))
    }

    /// Snapshot of the block to hand to the worker.
    pub(crate) fn start(&self) -> BlockMeta {
        let mut s = self.lock();
        s.status = BlockStatus::InFlight;
        s.started = Some(Instant::now());
        s.block.clone()
    }

    /// Record the outcome and wake all waiters. Later calls are ignored.
    pub(crate) fn finish(&self, block: Option<BlockMeta>, outcome: BlockOutcome) {
        let mut s = self.lock();
        if s.outcome.is_some() {
            return;
        }
        let now = Instant::now();
        s.started.get_or_insert(now);
        s.finished = Some(now);
        if let Some(block) = block {
            s.block = block;
        }
        s.status = BlockStatus::Done;
        s.outcome = Some(outcome);
        drop(s);
        self.done.notify_all();
    }
}

/// Aggregate timing of a finished file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// Latest block finish minus earliest block start.
    pub duration: Duration,
    /// Size of the file.
    pub bytes: u64,
}

impl TransferStats {
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Handle on one upload or download call. Cheap to clone; every clone sees
/// the same blocks.
#[derive(Debug, Clone)]
pub struct FileTransferContext {
    file: Arc<FileMeta>,
    blocks: Arc<[Arc<BlockTransferContext>]>,
}

impl FileTransferContext {
    pub(crate) fn new(file: Arc<FileMeta>, blocks: Vec<Arc<BlockTransferContext>>) -> Self {
        FileTransferContext {
            file,
            blocks: blocks.into(),
        }
    }

    pub fn file(&self) -> &Arc<FileMeta> {
        &self.file
    }

    /// Block contexts in the order they were submitted.
    pub fn blocks(&self) -> &[Arc<BlockTransferContext>] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block until every block is done. Safe to call from many threads and
    /// more than once.
    pub fn wait(&self) {
        for b in self.blocks.iter() {
            b.wait();
        }
    }

    pub fn blocks_done(&self) -> usize {
        self.blocks.iter().filter(|b| b.done()).count()
    }

    /// Bytes covered by finished blocks, successful or not.
    pub fn bytes_done(&self) -> u64 {
        self.blocks
            .iter()
            .filter_map(|b| {
                let s = b.lock();
                (s.status == BlockStatus::Done).then(|| s.block.exp_size())
            })
            .sum()
    }

    /// Index and outcome of every finished block that failed.
    pub fn failures(&self) -> Vec<(u64, BlockOutcome)> {
        self.blocks
            .iter()
            .filter_map(|b| {
                let s = b.lock();
                match &s.outcome {
                    Some(o @ BlockOutcome::Failed { .. }) => Some((s.block.index, o.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    /// True once every block finished successfully.
    pub fn is_success(&self) -> bool {
        self.blocks
            .iter()
            .all(|b| matches!(b.outcome(), Some(BlockOutcome::Success)))
    }

    /// Duration and size of the transfer. `None` if there are no blocks or
    /// some block has not finished yet.
    pub fn stats(&self) -> Option<TransferStats> {
        let mut first_start: Option<Instant> = None;
        let mut last_finish: Option<Instant> = None;
        for b in self.blocks.iter() {
            let s = b.lock();
            if s.status != BlockStatus::Done {
                return None;
            }
            let (start, finish) = (s.started?, s.finished?);
            first_start = Some(first_start.map_or(start, |f| f.min(start)));
            last_finish = Some(last_finish.map_or(finish, |l| l.max(finish)));
        }
        Some(TransferStats {
            duration: last_finish?.saturating_duration_since(first_start?),
            bytes: self.file.size,
        })
    }
}
