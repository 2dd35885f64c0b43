//! A thin sequential cursor over a [`Pager`].
//!
//! Concurrent operations on the same `Stream` are data-race-free but have no
//! sequencing guarantee on the resulting offsets: two concurrent writes may
//! both observe the same starting offset and overlap. Callers needing strict
//! sequencing should use one `Stream` per caller.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::pager::Pager;

pub struct Stream {
    pager: Arc<Pager>,
    off: AtomicI64,
}

impl Stream {
    pub fn new(pager: Arc<Pager>, off: i64) -> Self {
        Self {
            pager,
            off: AtomicI64::new(off),
        }
    }

    pub fn offset(&self) -> i64 {
        self.off.load(Ordering::SeqCst)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let off = self.off.load(Ordering::SeqCst);
        match self.pager.read_at(buf, off) {
            Ok(n) => {
                self.off.fetch_add(n as i64, Ordering::SeqCst);
                Ok(n)
            }
            Err(err) => {
                self.off.fetch_add(err.partial() as i64, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let off = self.off.load(Ordering::SeqCst);
        match self.pager.write_at(buf, off) {
            Ok(n) => {
                self.off.fetch_add(n as i64, Ordering::SeqCst);
                Ok(n)
            }
            Err(err) => {
                self.off.fetch_add(err.partial() as i64, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Absolute seek. Mirrors `std::io::Seek::seek(SeekFrom::Start(_))` for the
    /// common case; `seek_relative`/`seek_from_end` cover the other two.
    pub fn seek(&self, off: i64) {
        self.off.store(off, Ordering::SeqCst);
    }

    pub fn seek_relative(&self, delta: i64) -> i64 {
        self.off.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn seek_from_end(&self, delta: i64) -> i64 {
        let end = self.pager.size() as i64;
        let target = end + delta;
        self.off.store(target, Ordering::SeqCst);
        target
    }

    pub fn flush(&self) -> Result<()> {
        self.pager.flush()
    }
}
