//! The file-scoped coordinator: owns the backing file, the shard array, and
//! the authoritative logical file size, and is the single entry point
//! (`read_at`/`write_at`) that slices a byte-range request into page-aligned
//! chunks and routes each to its shard.

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::backing::BackingFile;
use crate::error::{Error, Result};
use crate::shard::{PageOp, Shard};

const DEFAULT_PAGE_SIZE: u64 = 4096;
const DEFAULT_BUFFER_SIZE: u64 = 8 * 1024 * 1024;
const MIN_PGMAX_TOTAL: u64 = 4;
const PAGES_PER_SHARD_TARGET: u64 = 32;
const MAX_SHARDS: u64 = 128;

/// The two size policies a [`Pager`] can be configured with: two policy
/// choices over the same cache rather than two separate cache
/// implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Size is fixed at construction; reads/writes past it are clamped to EOF.
    Fixed,
    /// Size grows to cover any write past the current size; only reads past
    /// the current size yield EOF.
    Growable,
}

/// The resolved sizing knobs for a pager, computed from a requested page size
/// and buffer size. Exposed standalone so the sizing algorithm is
/// unit-testable without opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerConfig {
    pub page_size: u64,
    pub pgmax: usize,
    pub nshards: usize,
}

impl PagerConfig {
    pub fn resolve(page_size: i64, buffer_size: i64) -> Self {
        let mut page_size = if page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size as u64
        };
        if !page_size.is_power_of_two() {
            page_size = page_size.next_power_of_two();
        }

        let mut buffer_size = if buffer_size <= 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size as u64
        };
        if buffer_size < page_size {
            buffer_size = page_size;
        }

        let pgmax_total = (buffer_size / page_size).max(MIN_PGMAX_TOTAL);
        let mut nshards = pgmax_total.div_ceil(PAGES_PER_SHARD_TARGET).min(MAX_SHARDS);
        nshards = nshards.max(1).next_power_of_two();
        let pgmax = (pgmax_total / nshards).max(1) as usize;

        Self {
            page_size,
            pgmax,
            nshards: nshards as usize,
        }
    }
}

struct PagerState {
    policy: SizePolicy,
    size: u64,
    closed: bool,
}

/// The sharded, LRU-governed page cache over a single backing file.
pub struct Pager {
    file: Box<dyn BackingFile>,
    pgsize: u64,
    shards: Vec<Mutex<Shard>>,
    nshards_mask: u64,
    state: RwLock<PagerState>,
}

/// A request buffer for either direction of [`Pager::io`], mirroring
/// [`PageOp`] at the pager level so the dispatcher's slicing logic is written
/// once for both `read_at` and `write_at`.
enum IoBuf<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl<'a> IoBuf<'a> {
    fn len(&self) -> usize {
        match self {
            IoBuf::Read(b) => b.len(),
            IoBuf::Write(b) => b.len(),
        }
    }

    fn is_write(&self) -> bool {
        matches!(self, IoBuf::Write(_))
    }

    fn truncate(self, n: usize) -> Self {
        match self {
            IoBuf::Read(b) => IoBuf::Read(&mut b[..n]),
            IoBuf::Write(b) => IoBuf::Write(&b[..n]),
        }
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        match self {
            IoBuf::Read(b) => {
                let (a, rest) = b.split_at_mut(mid);
                (IoBuf::Read(a), IoBuf::Read(rest))
            }
            IoBuf::Write(b) => {
                let (a, rest) = b.split_at(mid);
                (IoBuf::Write(a), IoBuf::Write(rest))
            }
        }
    }

    fn into_page_op(self) -> PageOp<'a> {
        match self {
            IoBuf::Read(b) => PageOp::Read(b),
            IoBuf::Write(b) => PageOp::Write(b),
        }
    }
}

impl Pager {
    /// Default 4096-byte pages, 8 MiB buffer, growable size.
    pub fn new(file: Box<dyn BackingFile>) -> Result<Self> {
        Self::with_size(file, 0, 0)
    }

    /// Zero arguments mean "use the default"; a non-power-of-two page size is
    /// rounded up. Size starts out growable; use [`Pager::with_fixed_size`] for
    /// the fixed-size variant used by the [`crate::file::File`] façade.
    pub fn with_size(file: Box<dyn BackingFile>, page_size: i64, buffer_size: i64) -> Result<Self> {
        let initial_size = file.len()?;
        Self::build(file, page_size, buffer_size, SizePolicy::Growable, initial_size)
    }

    pub(crate) fn with_fixed_size(
        file: Box<dyn BackingFile>,
        page_size: i64,
        buffer_size: i64,
        size: u64,
    ) -> Result<Self> {
        Self::build(file, page_size, buffer_size, SizePolicy::Fixed, size)
    }

    fn build(
        file: Box<dyn BackingFile>,
        page_size: i64,
        buffer_size: i64,
        policy: SizePolicy,
        size: u64,
    ) -> Result<Self> {
        let config = PagerConfig::resolve(page_size, buffer_size);
        let shards = (0..config.nshards).map(|_| Mutex::new(Shard::new(config.pgmax))).collect();

        Ok(Self {
            file,
            pgsize: config.page_size,
            shards,
            nshards_mask: config.nshards as u64 - 1,
            state: RwLock::new(PagerState {
                policy,
                size,
                closed: false,
            }),
        })
    }

    pub fn page_size(&self) -> u64 {
        self.pgsize
    }

    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    pub fn read_at(&self, buf: &mut [u8], off: i64) -> Result<usize> {
        self.io(off, IoBuf::Read(buf))
    }

    pub fn write_at(&self, buf: &[u8], off: i64) -> Result<usize> {
        self.io(off, IoBuf::Write(buf))
    }

    fn io(&self, off: i64, buf: IoBuf<'_>) -> Result<usize> {
        if off < 0 {
            return Err(Error::invalid_argument());
        }
        let off = off as u64;
        let write = buf.is_write();
        let requested = buf.len();

        let (effective_len, eof) = self.bounds_check(off, requested, write)?;
        let buf = buf.truncate(effective_len);

        let file_size = self.size();
        let transferred = self.walk_pages(off, file_size, buf)?;

        if eof {
            Err(Error::eof(transferred))
        } else {
            Ok(transferred)
        }
    }

    /// Closed check, growable extension, fixed clamp, in that order.
    /// Returns the in-bounds prefix length to actually transfer and whether an
    /// EOF sentinel should accompany a successful result.
    fn bounds_check(&self, off: u64, requested: usize, write: bool) -> Result<(usize, bool)> {
        {
            let state = self.state.read();
            if state.closed {
                return Err(Error::closed());
            }

            if state.policy == SizePolicy::Growable {
                let end = off + requested as u64;
                if write {
                    if end > state.size {
                        drop(state);
                        let mut state = self.state.write();
                        if end > state.size {
                            debug!("extending pager size from {} to {end}", state.size);
                            state.size = end;
                        }
                    }
                    return Ok((requested, false));
                }

                if off >= state.size {
                    return Ok((0, true));
                }
                if end > state.size {
                    return Ok(((state.size - off) as usize, true));
                }
                return Ok((requested, false));
            }

            // Fixed: both directions are clamped to the committed size.
            if off + requested as u64 > state.size {
                let in_bounds = state.size.saturating_sub(off) as usize;
                return Ok((in_bounds, true));
            }
            Ok((requested, false))
        }
    }

    /// Walks `buf` in page-aligned chunks, dispatching each to its shard.
    /// Short-circuits on the first per-chunk error, returning the bytes
    /// transferred so far alongside it.
    fn walk_pages(&self, mut off: u64, file_size: u64, mut buf: IoBuf<'_>) -> Result<usize> {
        let mut transferred = 0usize;

        while buf.len() > 0 {
            let pnum = off / self.pgsize;
            let pstart = (off & (self.pgsize - 1)) as usize;
            let remaining = buf.len();
            let pend = (self.pgsize as usize).min(pstart + remaining);
            let chunk_len = pend - pstart;

            let (chunk, rest) = buf.split_at(chunk_len);
            let shard_idx = (pnum & self.nshards_mask) as usize;

            let result = {
                let mut shard = self.shards[shard_idx].lock();
                shard.pio(self.file.as_ref(), pnum, pstart, self.pgsize as usize, file_size, chunk.into_page_op())
            };

            match result {
                Ok(n) => {
                    transferred += n;
                    off += n as u64;
                    buf = rest;
                }
                Err(err) => return Err(Error::io_with_partial(err, transferred)),
            }
        }

        Ok(transferred)
    }

    /// Writes every dirty page in every shard back to the backing file. Stops
    /// at the first error; pages flushed before it remain clean.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.write();
        if state.closed {
            return Err(Error::closed());
        }
        let file_size = state.size;
        let total_dirty: usize = self.shards.iter().map(|s| s.lock().dirty_page_numbers().len()).sum();
        debug!("flush: {total_dirty} dirty pages across {} shards", self.shards.len());

        let mut flushed = 0;
        for shard_lock in &self.shards {
            let mut shard = shard_lock.lock();
            match shard.flush(self.file.as_ref(), self.pgsize, file_size) {
                Ok(n) => flushed += n,
                Err(err) => {
                    warn!("flush: writeback failed after {flushed} pages: {err}");
                    return Err(Error::io_with_partial(err, flushed));
                }
            }
        }
        debug!("flush: wrote back {flushed} pages");
        Ok(())
    }

    /// Flush, then durably commit the backing file.
    pub fn sync(&self) -> Result<()> {
        self.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Marks the pager closed; idempotent calls after the first fail with
    /// closed-resource. Used by the fixed-size [`crate::file::File`] façade.
    pub(crate) fn close(&self) -> Result<()> {
        {
            let state = self.state.read();
            if state.closed {
                return Err(Error::closed());
            }
        }
        self.sync()?;
        self.file.close()?;
        let mut state = self.state.write();
        state.closed = true;
        Ok(())
    }

    /// Truncates the backing file to `n` bytes and updates the authoritative
    /// size. Pages wholly outside `[0, n)` are not proactively evicted.
    pub(crate) fn truncate(&self, n: u64) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(Error::closed());
        }
        self.file.set_len(n)?;
        state.size = n;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[cfg(test)]
    pub(crate) fn shard_len(&self, idx: usize) -> usize {
        self.shards[idx].lock().len()
    }

    #[cfg(test)]
    pub(crate) fn shard_dirty(&self, idx: usize) -> Vec<u64> {
        self.shards[idx].lock().dirty_page_numbers()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::MemFile;

    #[test]
    fn write_spanning_page_boundary_dirties_both_pages() {
        // page_size=4, buffer_size=16 -> pgmax_total=4, nshards=1: both pages
        // land in shard 0, so a single `shard_dirty` call sees both.
        let pager = Pager::with_size(Box::new(MemFile::with_len(16)), 4, 16).unwrap();
        assert_eq!(pager.shard_count(), 1);

        // offset 2, len 4 covers page 0 bytes [2,4) and page 1 bytes [0,2).
        pager.write_at(&[0xAAu8; 4], 2).unwrap();

        let mut dirty = pager.shard_dirty(0);
        dirty.sort_unstable();
        assert_eq!(dirty, vec![0, 1]);
    }

    #[test]
    fn resolve_uses_defaults_for_nonpositive_inputs() {
        let cfg = PagerConfig::resolve(0, 0);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert!(cfg.nshards.is_power_of_two());
        assert!(cfg.pgmax >= 1);
    }

    #[test]
    fn resolve_rounds_page_size_up_to_power_of_two() {
        let cfg = PagerConfig::resolve(5000, 0);
        assert_eq!(cfg.page_size, 8192);
    }

    #[test]
    fn resolve_raises_buffer_size_to_at_least_one_page() {
        let cfg = PagerConfig::resolve(4096, 100);
        assert_eq!(cfg.pgmax * cfg.nshards, 4); // MIN_PGMAX_TOTAL floor
    }

    #[test]
    fn resolve_caps_shard_count_at_128() {
        let cfg = PagerConfig::resolve(4096, 4096 * 1_000_000);
        assert_eq!(cfg.nshards, 128);
    }

    #[test]
    fn resolve_shard_count_is_power_of_two_and_bounded_by_target() {
        // 4096 pages total / 32-per-shard target = 128 shards exactly
        let cfg = PagerConfig::resolve(4096, 4096 * 4096);
        assert_eq!(cfg.nshards, 128);
        assert!(cfg.pgmax >= 1);
    }
}
