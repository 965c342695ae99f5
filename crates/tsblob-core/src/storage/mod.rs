//! Positional I/O and download file lifecycle.
//!
//! The engine never touches a shared cursor: sources are read through
//! [`ReadAt`] and destinations written through [`WriteAt`] (pread/pwrite on
//! Unix), so any number of workers can work on one file at once.
//!
//! Download destinations on disk go through [`StorageWriter`]: a `.part` temp
//! file, preallocated (fallocate where available), then synced and atomically
//! renamed to the final name once the content is verified.

mod builder;
mod memory;
mod writer;

pub use builder::StorageWriterBuilder;
pub use memory::MemoryBuffer;
pub use writer::StorageWriter;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Read at an absolute offset without moving any cursor.
pub trait ReadAt: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns 0 at EOF.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Write at an absolute offset without moving any cursor.
pub trait WriteAt: Send + Sync {
    /// Write up to `buf.len()` bytes starting at `offset`.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

/// Fill `buf` from `offset`, stopping early only at EOF.
/// Returns the number of bytes read; less than `buf.len()` means EOF was hit.
pub fn read_full_at<R: ReadAt + ?Sized>(src: &R, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match src.read_at(&mut buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

/// Write all of `buf` at `offset`, stopping early only if the destination
/// accepts zero bytes. Returns the number of bytes written.
pub fn write_full_at<W: WriteAt + ?Sized>(dst: &W, buf: &[u8], offset: u64) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match dst.write_at(&buf[done..], offset + done as u64) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

/// Sequential [`io::Read`] over a [`ReadAt`] source, starting at offset 0.
/// Does not share a cursor with anyone else reading the source.
pub struct PositionalReader<'a, R: ?Sized> {
    src: &'a R,
    pos: u64,
}

impl<'a, R: ReadAt + ?Sized> PositionalReader<'a, R> {
    pub fn new(src: &'a R) -> Self {
        PositionalReader { src, pos: 0 }
    }
}

impl<R: ReadAt + ?Sized> io::Read for PositionalReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = read_full_at(self.src, buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(unix)]
impl WriteAt for File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }
}

// seek_read/seek_write move the handle's cursor, but every call passes an
// explicit offset so concurrent callers never rely on it.
#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

#[cfg(windows)]
impl WriteAt for File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_write(self, buf, offset)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}
