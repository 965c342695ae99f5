use super::*;
use crate::error::ErrorKind;
use crate::storage::MemoryBuffer;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Blocks {
    stored: Mutex<HashMap<u64, (u64, Vec<u8>)>>,
}

impl BlockUploader for Blocks {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError> {
        self.stored
            .lock()
            .unwrap()
            .insert(block.index, (block.offset(), data.to_vec()));
        Ok(())
    }
}

impl BlockDownloader for Blocks {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        self.stored
            .lock()
            .unwrap()
            .get(&block.index)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| BackendError::NotFound(format!("block {}", block.index)))
    }
}

fn file_meta(content: &[u8], block_size: u64) -> Arc<FileMeta> {
    Arc::new(
        FileMeta::from_reader(content)
            .unwrap()
            .with_path("/t/file")
            .with_block_size(block_size)
            .with_time(1_700_000_000),
    )
}

#[test]
fn zero_workers_selects_defaults() {
    let engine = Engine::new(0, 0).unwrap();
    assert_eq!(engine.num_workers(), (DEFAULT_UPLOAD_WORKERS, DEFAULT_DOWNLOAD_WORKERS));
    let engine = Engine::new(2, 3).unwrap();
    assert_eq!(engine.num_workers(), (2, 3));
}

#[test]
fn upload_then_download_reconstructs() {
    let engine = Engine::new(2, 2).unwrap();
    let content = b"abcdefgh".to_vec();
    let fm = file_meta(&content, 4);
    let store = Arc::new(Blocks::default());

    let up = engine
        .upload_file(Arc::new(content.clone()), Arc::clone(&fm), store.clone())
        .unwrap();
    up.wait();
    assert!(up.is_success(), "{:?}", up.failures());
    {
        let stored = store.stored.lock().unwrap();
        assert_eq!(stored[&0], (0, b"abcd".to_vec()));
        assert_eq!(stored[&1], (4, b"efgh".to_vec()));
    }
    let uploaded: Vec<BlockMeta> = up.blocks().iter().map(|b| b.block()).collect();
    assert_eq!(uploaded[1].sha256, crate::checksum::sha256_bytes(b"efgh"));

    let dest = Arc::new(MemoryBuffer::new());
    let down = engine
        .download_file(dest.clone(), uploaded, store.clone())
        .unwrap();
    down.wait();
    assert!(down.is_success(), "{:?}", down.failures());
    assert_eq!(dest.to_vec(), content);
    fm.compare_sha256_against(&dest.to_vec()[..]).unwrap();
}

#[test]
fn zero_block_size_is_rejected_synchronously() {
    let engine = Engine::new(1, 1).unwrap();
    let fm = file_meta(b"abc", 0);
    let err = engine
        .upload_file(Arc::new(b"abc".to_vec()), fm, Arc::new(Blocks::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn download_preconditions() {
    let engine = Engine::new(1, 1).unwrap();
    let err = engine
        .download_file(Arc::new(MemoryBuffer::new()), Vec::new(), Arc::new(Blocks::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    // Equal but distinct FileMeta instances do not make one file.
    let a = file_meta(b"abcdefgh", 4);
    let b = Arc::new((*a).clone());
    let mixed = vec![a.new_block_meta(0), b.new_block_meta(1)];
    let err = engine
        .download_file(Arc::new(MemoryBuffer::new()), mixed, Arc::new(Blocks::default()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn empty_file_has_no_blocks_and_no_stats() {
    let engine = Engine::new(1, 1).unwrap();
    let fm = file_meta(b"", 4);
    let ctx = engine
        .upload_file(Arc::new(Vec::new()), fm, Arc::new(Blocks::default()))
        .unwrap();
    ctx.wait();
    assert_eq!(ctx.block_count(), 0);
    assert!(ctx.stats().is_none());
}

struct FailOne {
    inner: Blocks,
    bad: u64,
}

impl BlockUploader for FailOne {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError> {
        if block.index == self.bad {
            return Err(BackendError::Other("disk full".into()));
        }
        self.inner.upload_block(data, block)
    }
}

#[test]
fn failing_block_does_not_stop_siblings() {
    let engine = Engine::new(3, 1).unwrap();
    let content: Vec<u8> = (0..40u8).collect();
    let fm = file_meta(&content, 4);
    let backend = Arc::new(FailOne {
        inner: Blocks::default(),
        bad: 3,
    });
    let ctx = engine
        .upload_file(Arc::new(content), fm, backend.clone())
        .unwrap();
    ctx.wait();
    assert_eq!(ctx.blocks_done(), 10);
    assert!(!ctx.is_success());
    let failures = ctx.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 3);
    assert!(matches!(
        &failures[0].1,
        BlockOutcome::Failed { kind: ErrorKind::Backend, detail } if detail.contains("disk full")
    ));
    assert_eq!(backend.inner.stored.lock().unwrap().len(), 9);
}

struct Panics;

impl BlockDownloader for Panics {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        if block.index == 0 {
            panic!("backend bug");
        }
        Ok(vec![0u8; block.exp_size() as usize])
    }
}

#[test]
fn panicking_backend_becomes_failed_outcome() {
    let engine = Engine::new(1, 1).unwrap();
    let fm = file_meta(&[0u8; 8], 4);
    let mut blocks = fm.block_metas();
    for b in &mut blocks {
        b.set_sha256_bytes(&[0u8; 4]).unwrap();
    }
    let ctx = engine
        .download_file(Arc::new(MemoryBuffer::new()), blocks, Arc::new(Panics))
        .unwrap();
    ctx.wait();
    let failures = ctx.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0].1,
        BlockOutcome::Failed { kind: ErrorKind::Backend, detail } if detail.contains("backend bug")
    ));
    // The single worker survived and ran block 1.
    assert_eq!(ctx.blocks()[1].outcome(), Some(BlockOutcome::Success));
}

struct Truncating;

impl BlockDownloader for Truncating {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0u8; block.exp_size() as usize - 1])
    }
}

#[test]
fn short_download_is_short_io() {
    let engine = Engine::new(1, 1).unwrap();
    let fm = file_meta(b"abcd", 4);
    let ctx = engine
        .download_file(Arc::new(MemoryBuffer::new()), fm.block_metas(), Arc::new(Truncating))
        .unwrap();
    ctx.wait();
    assert!(matches!(
        ctx.blocks()[0].outcome(),
        Some(BlockOutcome::Failed {
            kind: ErrorKind::ShortIo,
            ..
        })
    ));
}

#[test]
fn sync_helpers_report_errors_directly() {
    let fm = file_meta(b"abcdefgh", 4);
    let store = Blocks::default();
    let mut block = fm.new_block_meta(1);
    upload_block(b"abcd".as_slice(), &mut block, &store).unwrap_err();
    upload_block(b"abcdefgh".as_slice(), &mut block, &store).unwrap();
    assert_eq!(block.sha256, crate::checksum::sha256_bytes(b"efgh"));

    let dest = MemoryBuffer::new();
    download_block(&dest, &block, &store).unwrap();
    assert_eq!(dest.to_vec(), b"\0\0\0\0efgh");

    let mut wrong = block.clone();
    wrong.sha256 = [0u8; 32];
    let err = download_block(&dest, &wrong, &store).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
}

/// Downloader that blocks until released, to observe in-flight state.
struct Gated {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl BlockDownloader for Gated {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        self.gate.lock().unwrap().recv().ok();
        Ok(b"abcdefgh"[block.range().start as usize..block.range().end as usize].to_vec())
    }
}

#[test]
fn stats_and_waiters() {
    let engine = Engine::new(1, 2).unwrap();
    let fm = file_meta(b"abcdefgh", 4);
    let mut blocks = fm.block_metas();
    blocks[0].set_sha256_bytes(b"abcd").unwrap();
    blocks[1].set_sha256_bytes(b"efgh").unwrap();
    let (release, gate) = mpsc::channel();
    let ctx = engine
        .download_file(
            Arc::new(MemoryBuffer::new()),
            blocks,
            Arc::new(Gated {
                gate: Mutex::new(gate),
            }),
        )
        .unwrap();

    assert!(ctx.stats().is_none());
    assert!(!ctx.blocks()[0].done());

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                ctx.wait();
                ctx.blocks_done()
            })
        })
        .collect();
    std::thread::sleep(Duration::from_millis(20));
    release.send(()).unwrap();
    release.send(()).unwrap();
    for w in waiters {
        assert_eq!(w.join().unwrap(), 2);
    }

    ctx.wait();
    assert!(ctx.is_success());
    assert_eq!(ctx.bytes_done(), 8);
    let stats = ctx.stats().unwrap();
    assert_eq!(stats.bytes, 8);
    assert!(stats.duration > Duration::ZERO);
    assert!(stats.bytes_per_sec() > 0.0);
    for b in ctx.blocks() {
        assert_eq!(b.status(), BlockStatus::Done);
        assert!(b.elapsed().is_some());
    }
}

#[test]
fn dropping_engine_drains_queued_work() {
    let content: Vec<u8> = (0..64u8).collect();
    let fm = file_meta(&content, 4);
    let store = Arc::new(Blocks::default());
    let ctx = {
        let engine = Engine::new(2, 1).unwrap();
        engine
            .upload_file(Arc::new(content), fm, store.clone())
            .unwrap()
    };
    assert_eq!(ctx.blocks_done(), 16);
    assert!(ctx.is_success());
    assert_eq!(store.stored.lock().unwrap().len(), 16);
}
