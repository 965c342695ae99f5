//! Volume wrapper that records how many calls are in flight at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tsblob_core::{BackendError, BlockDownloader, BlockMeta, BlockUploader, MemoryVolume};

pub struct InstrumentedVolume {
    pub inner: MemoryVolume,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl InstrumentedVolume {
    pub fn new(delay: Duration) -> Self {
        InstrumentedVolume {
            inner: MemoryVolume::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        let out = f();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

impl BlockUploader for InstrumentedVolume {
    fn upload_block(&self, data: &[u8], block: &BlockMeta) -> Result<(), BackendError> {
        self.tracked(|| self.inner.upload_block(data, block))
    }
}

impl BlockDownloader for InstrumentedVolume {
    fn download_block(&self, block: &BlockMeta) -> Result<Vec<u8>, BackendError> {
        self.tracked(|| self.inner.download_block(block))
    }
}
