//! An independently-locked partition of the page cache.
//!
//! Each shard owns a slab of [`Page`]s threaded into an intrusive doubly
//! linked LRU list (sentinel head/tail at fixed slab slots), a `page number ->
//! slab index` map, and a dirty-set. The whole shard is guarded by a single
//! `parking_lot::Mutex`, held for the duration of one `pio` call — see
//! `Pager::io` for how shards are selected and locked.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::backing::BackingFile;
use crate::page::{Page, HEAD_SLOT, NIL, TAIL_SLOT};

/// The operation a call to [`Shard::pio`] performs against the page, carrying
/// the caller-provided byte slice for either direction.
pub(crate) enum PageOp<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl PageOp<'_> {
    fn len(&self) -> usize {
        match self {
            PageOp::Read(b) => b.len(),
            PageOp::Write(b) => b.len(),
        }
    }

    fn is_write(&self) -> bool {
        matches!(self, PageOp::Write(_))
    }
}

pub(crate) struct Shard {
    slab: Vec<Page>,
    pages: HashMap<u64, usize>,
    dirty: HashSet<u64>,
    pgmax: usize,
}

impl Shard {
    pub fn new(pgmax: usize) -> Self {
        let mut slab = Vec::with_capacity(pgmax + 2);
        slab.push(Page::sentinel()); // HEAD_SLOT
        slab.push(Page::sentinel()); // TAIL_SLOT
        slab[HEAD_SLOT].next = TAIL_SLOT;
        slab[TAIL_SLOT].prev = HEAD_SLOT;
        Self {
            slab,
            pages: HashMap::new(),
            dirty: HashSet::new(),
            pgmax,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn dirty_page_numbers(&self) -> Vec<u64> {
        self.dirty.iter().copied().collect()
    }

    fn push_mru(&mut self, idx: usize) {
        let old_first = self.slab[HEAD_SLOT].next;
        self.slab[idx].prev = HEAD_SLOT;
        self.slab[idx].next = old_first;
        self.slab[old_first].prev = idx;
        self.slab[HEAD_SLOT].next = idx;
    }

    fn pop(&mut self, idx: usize) {
        let prev = self.slab[idx].prev;
        let next = self.slab[idx].next;
        self.slab[prev].next = next;
        self.slab[next].prev = prev;
        self.slab[idx].prev = NIL;
        self.slab[idx].next = NIL;
    }

    fn bump(&mut self, idx: usize) {
        self.pop(idx);
        self.push_mru(idx);
    }

    /// The LRU eviction candidate: the page just before the tail sentinel.
    /// `None` if the shard is empty.
    fn lru_candidate(&self) -> Option<usize> {
        let idx = self.slab[TAIL_SLOT].prev;
        if idx == HEAD_SLOT {
            None
        } else {
            Some(idx)
        }
    }

    fn write_back(&self, file: &dyn BackingFile, idx: usize, page_size: u64, file_size: u64) -> std::io::Result<()> {
        let page = &self.slab[idx];
        let offset = page.num * page_size;
        let len = page_size.min(file_size.saturating_sub(offset)) as usize;
        file.write_at(&page.data[..len], offset)?;
        Ok(())
    }

    /// Acquires the page for `pnum`, performing eviction/allocation/loading as
    /// needed, and applies `op` against the in-bounds intra-page range
    /// `[pstart, pstart + op.len())`. Returns the number of bytes transferred.
    ///
    /// `file_size` is used only to truncate a dirty evictee's writeback to the
    /// pager's authoritative logical size (the tail-page case).
    pub fn pio(
        &mut self,
        file: &dyn BackingFile,
        pnum: u64,
        pstart: usize,
        page_size: usize,
        file_size: u64,
        op: PageOp<'_>,
    ) -> std::io::Result<usize> {
        let pend = pstart + op.len();
        debug_assert!(pend <= page_size);

        let idx = match self.pages.get(&pnum).copied() {
            Some(idx) => {
                self.bump(idx);
                idx
            }
            None => self.fault_in(file, pnum, pstart, pend, page_size, file_size, op.is_write())?,
        };

        let n = op.len();
        match op {
            PageOp::Write(src) => {
                self.slab[idx].data[pstart..pend].copy_from_slice(src);
                self.dirty.insert(pnum);
            }
            PageOp::Read(dst) => {
                dst.copy_from_slice(&self.slab[idx].data[pstart..pend]);
            }
        }
        Ok(n)
    }

    /// Handles the miss path of `pio`: evict-or-allocate, load from file if
    /// needed, insert into the map, push to MRU. Returns the slab index.
    #[allow(clippy::too_many_arguments)]
    fn fault_in(
        &mut self,
        file: &dyn BackingFile,
        pnum: u64,
        pstart: usize,
        pend: usize,
        page_size: usize,
        file_size: u64,
        write: bool,
    ) -> std::io::Result<usize> {
        let is_full_page_write = write && pstart == 0 && pend == page_size;
        let is_partial_write = write && !is_full_page_write;

        let idx = if self.pages.len() == self.pgmax {
            let victim = self
                .lru_candidate()
                .expect("shard at capacity must have a real LRU candidate");
            self.pop(victim);
            let victim_num = self.slab[victim].num;
            self.pages.remove(&victim_num);

            if self.dirty.remove(&victim_num) {
                trace!("evicting dirty page {victim_num} to host page {pnum}, writing back first");
                self.write_back(file, victim, page_size as u64, file_size)?;
            } else {
                trace!("evicting clean page {victim_num} to host page {pnum}");
            }

            if is_partial_write {
                self.slab[victim].data.fill(0);
            }
            self.slab[victim].num = pnum;
            victim
        } else {
            let page = Page::new(pnum, page_size);
            self.slab.push(page);
            self.slab.len() - 1
        };

        // Full-page writes overwrite every byte, so skip the cold read.
        // Reads and partial writes need the file's current contents first.
        if !is_full_page_write {
            let offset = pnum * page_size as u64;
            match file.read_at(&mut self.slab[idx].data, offset) {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {}
                Err(err) => return Err(err),
            }
        }

        self.pages.insert(pnum, idx);
        self.push_mru(idx);
        Ok(idx)
    }

    /// Writes back every dirty page, clearing the dirty-set as it goes. Stops
    /// at the first error, leaving the failing page (and anything after it)
    /// dirty.
    pub fn flush(&mut self, file: &dyn BackingFile, page_size: u64, file_size: u64) -> std::io::Result<usize> {
        let nums: Vec<u64> = self.dirty.iter().copied().collect();
        let mut flushed = 0;
        for num in nums {
            let idx = match self.pages.get(&num).copied() {
                Some(idx) => idx,
                None => {
                    self.dirty.remove(&num);
                    continue;
                }
            };
            self.write_back(file, idx, page_size, file_size)?;
            self.dirty.remove(&num);
            flushed += 1;
        }
        Ok(flushed)
    }
}
