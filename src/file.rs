//! A size-capped façade over a [`Pager`], specialized for the fixed-size
//! model: `Create`/`Open`/`Stat`/`Close`/`Truncate`/`Clone`, plus the
//! `Chmod`/`Chown` passthroughs that only make sense against a real on-disk
//! file and are therefore compiled only under `cfg(unix)`.

use std::fs::{Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backing::open_file;
use crate::error::Result;
use crate::pager::Pager;

/// A fixed-size, closeable handle onto a pager. All clones share one `Pager`
/// (and therefore one cache, one dirty-set, and one close).
#[derive(Clone)]
pub struct File {
    pager: Arc<Pager>,
    path: Arc<PathBuf>,
}

impl File {
    /// Opens with truncate+create, sets the backing file's length to
    /// `file_size`, and pins the pager's logical size to it.
    pub fn create(path: impl AsRef<Path>, file_size: u64, buffer_size: i64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = open_file(&path, true)?;
        raw.set_len(file_size)?;
        let pager = Pager::with_fixed_size(Box::new(raw), 0, buffer_size, file_size)?;
        Ok(Self {
            pager: Arc::new(pager),
            path: Arc::new(path),
        })
    }

    /// Opens an existing file read/write, reading `size` from its metadata.
    pub fn open(path: impl AsRef<Path>, buffer_size: i64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = open_file(&path, false)?;
        let size = raw.metadata()?.len();
        let pager = Pager::with_fixed_size(Box::new(raw), 0, buffer_size, size)?;
        Ok(Self {
            pager: Arc::new(pager),
            path: Arc::new(path),
        })
    }

    /// Opens with caller-supplied flags, for read-only or custom-create needs.
    pub fn open_file(path: impl AsRef<Path>, options: &OpenOptions, buffer_size: i64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = options.open(&path)?;
        let size = raw.metadata()?.len();
        let pager = Pager::with_fixed_size(Box::new(raw), 0, buffer_size, size)?;
        Ok(Self {
            pager: Arc::new(pager),
            path: Arc::new(path),
        })
    }

    pub fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        self.pager.read_at(buf, off)
    }

    pub fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        self.pager.write_at(buf, off)
    }

    pub fn flush(&self) -> Result<()> {
        self.pager.flush()
    }

    pub fn sync(&self) -> Result<()> {
        self.pager.sync()
    }

    /// Flushes, syncs, and marks the pager closed. All clones observe the
    /// closed state afterward; a second `close` (from any clone) fails.
    pub fn close(&self) -> Result<()> {
        self.pager.close()
    }

    pub fn truncate(&self, n: u64) -> Result<()> {
        self.pager.truncate(n)
    }

    pub fn name(&self) -> &Path {
        &self.path
    }

    pub fn stat(&self) -> io::Result<Metadata> {
        std::fs::metadata(&*self.path)
    }

    pub fn size(&self) -> u64 {
        self.pager.size()
    }

    #[cfg(unix)]
    pub fn chmod(&self, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = self.stat()?.permissions();
        perms.set_mode(mode);
        std::fs::set_permissions(&*self.path, perms)
    }

    #[cfg(unix)]
    pub fn chown(&self, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::chown(&*self.path, uid, gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn create_then_reopen_round_trips() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();

        let file = File::create(&path, 100, 0).unwrap();
        file.write_at(b"hello, world", 0).unwrap();
        file.close().unwrap();

        let reopened = File::open(&path, 0).unwrap();
        let mut buf = [0u8; 12];
        reopened.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"hello, world");
    }

    #[test]
    fn clones_share_one_pager_and_close() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path(), 100, 0).unwrap();
        let clone = file.clone();

        file.write_at(b"x", 0).unwrap();
        let mut buf = [0u8; 1];
        clone.read_at(&mut buf, 0).unwrap();
        assert_eq!(buf[0], b'x');

        file.close().unwrap();
        let mut buf2 = [0u8; 1];
        let err = clone.read_at(&mut buf2, 0).unwrap_err();
        assert!(matches!(err.kind, crate::error::ErrorKind::Closed));
    }

    #[test]
    fn truncate_updates_size_and_tail_reads_eof() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path(), 100, 0).unwrap();
        file.truncate(10).unwrap();
        assert_eq!(file.size(), 10);

        let mut buf = [0u8; 5];
        let err = file.read_at(&mut buf, 8).unwrap_err();
        assert!(err.is_eof());
        assert_eq!(err.partial(), 2);
    }
}
