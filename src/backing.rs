//! The trait boundary the pager programs against instead of `std::fs::File`
//! directly.
//!
//! Positional I/O (`read_at`/`write_at`) is the load-bearing requirement: pages
//! belonging to different shards are read and written concurrently from
//! different threads, so the collaborator must not serialize unrelated offsets
//! behind a shared cursor the way `Seek` + `Read`/`Write` would.

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
};

#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// A byte-addressable file the pager can cache pages against.
///
/// Implementors must make `read_at`/`write_at` safe to call concurrently from
/// multiple threads at non-overlapping offsets.
pub trait BackingFile: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
    fn len(&self) -> io::Result<u64>;
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn sync_all(&self) -> io::Result<()>;
    /// Releases any OS-level resources held by the collaborator. Called once
    /// by `Pager::close`; implementors for which closing is a no-op (e.g. an
    /// in-memory double) can return `Ok(())`.
    fn close(&self) -> io::Result<()>;
}

impl BackingFile for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }

    #[cfg(not(unix))]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt as WinFileExt;
        WinFileExt::seek_read(self, buf, offset)
    }

    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        FileExt::write_at(self, buf, offset)
    }

    #[cfg(not(unix))]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt as WinFileExt;
        WinFileExt::seek_write(self, buf, offset)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }

    /// `std::fs::File` has no safe `&self` close; the descriptor closes when
    /// the `File` is dropped (when the pager's `Box<dyn BackingFile>` is
    /// dropped). Nothing to do here but it keeps `Pager::close` honest about
    /// having asked the collaborator.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens (creating if needed) a file at `path` for positional read/write.
pub fn open_file(path: impl AsRef<Path>, create: bool) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .open(path)
}

/// An in-memory backing file, used by unit tests and by the scenario tests
/// that need to count I/O calls (e.g. asserting a full-page write never reads
/// the page it's about to fully overwrite).
#[derive(Default)]
pub struct MemFile {
    inner: Mutex<MemFileInner>,
}

#[derive(Default)]
struct MemFileInner {
    data: Vec<u8>,
    reads: usize,
    writes: usize,
}

impl MemFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_len(len: u64) -> Self {
        let file = Self::new();
        file.set_len(len).unwrap();
        file
    }

    pub fn read_count(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().data.clone()
    }
}

impl BackingFile for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        let offset = offset as usize;
        if offset >= inner.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(inner.data.len() - offset);
        buf[..n].copy_from_slice(&inner.data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        let offset = offset as usize;
        let end = offset + buf.len();
        if inner.data.len() < end {
            inner.data.resize(end, 0);
        }
        inner.data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.inner.lock().unwrap().data.len() as u64)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.inner.lock().unwrap().data.resize(len as usize, 0);
        Ok(())
    }

    fn sync_all(&self) -> io::Result<()> {
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}
