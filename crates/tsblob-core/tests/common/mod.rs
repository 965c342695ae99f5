#![allow(dead_code)]

pub mod influx_server;
pub mod instrumented;

use std::sync::Arc;
use tsblob_core::FileMeta;

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// `FileMeta` for `content` stored at `path`.
pub fn file_meta(path: &str, content: &[u8], block_size: u64) -> Arc<FileMeta> {
    Arc::new(
        FileMeta::from_reader(content)
            .unwrap()
            .with_path(path)
            .with_block_size(block_size)
            .with_time(1_700_000_000),
    )
}
