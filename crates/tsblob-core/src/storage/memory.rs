//! In-memory positional buffer.

use std::io;
use std::sync::{Mutex, MutexGuard};

use super::{ReadAt, WriteAt};

/// Growable byte buffer usable as both transfer source and destination.
/// Writes past the end zero-fill the gap, like a sparse file.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    data: Mutex<Vec<u8>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer holding `len` zero bytes.
    pub fn with_len(len: usize) -> Self {
        MemoryBuffer {
            data: Mutex::new(vec![0u8; len]),
        }
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl From<Vec<u8>> for MemoryBuffer {
    fn from(data: Vec<u8>) -> Self {
        MemoryBuffer {
            data: Mutex::new(data),
        }
    }
}

impl ReadAt for MemoryBuffer {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.lock().as_slice().read_at(buf, offset)
    }
}

impl WriteAt for MemoryBuffer {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds address space"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "write end overflows"))?;
        let mut data = self.lock();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }
}
