//! End-to-end scenarios against the public API: a real file on disk, a
//! fixed-size façade, and a raw in-memory pager for the cases that need
//! I/O-call counting or artificially small caches.

use std::io::Read;
use std::sync::Arc;

use rand::Rng;
use tempfile::NamedTempFile;

use pagepool::{File, MemFile, Pager};

#[test]
fn round_trip_at_scale() {
    let total_len: usize = 1_234_567;
    let mut original = vec![0u8; total_len];
    rand::rng().fill(&mut original[..]);

    let tmp = NamedTempFile::new().unwrap();
    let file = File::create(tmp.path(), total_len as u64, 0).unwrap();

    let sizes = [10usize, 100, 1000, 10000];
    let mut rng = rand::rng();
    let mut off = 0usize;
    let mut i = 0;
    while off < total_len {
        let cap = sizes[i % sizes.len()];
        let mut chunk = cap.min(total_len - off).max(1);
        chunk = rng.random_range(1..=chunk);
        file.write_at(&original[off..off + chunk], off as i64).unwrap();
        off += chunk;
        i += 1;
    }

    file.flush().unwrap();
    file.sync().unwrap();
    let clone = file.clone();
    file.close().unwrap();

    let reopened = File::open(tmp.path(), 0).unwrap();
    let mut from_pager = vec![0u8; total_len];
    reopened.read_at(&mut from_pager, 0).unwrap();
    assert_eq!(from_pager, original);

    let mut from_clone = vec![0u8; total_len];
    let err = clone.read_at(&mut from_clone, 0);
    assert!(err.is_err(), "clone should observe the close");

    let mut raw = Vec::new();
    std::fs::File::open(tmp.path()).unwrap().read_to_end(&mut raw).unwrap();
    assert_eq!(raw, original);
}

#[test]
fn closed_clone_reads_fail() {
    let tmp = NamedTempFile::new().unwrap();
    let file = File::create(tmp.path(), 64, 0).unwrap();
    let clone = file.clone();

    file.close().unwrap();

    let mut buf = [0u8; 8];
    let err = clone.read_at(&mut buf, 0).unwrap_err();
    assert!(matches!(err.kind, pagepool::ErrorKind::Closed));
}

#[test]
fn concurrent_random_io_stays_bounded_and_panic_free() {
    let _ = env_logger::try_init();
    let size: u64 = 10_000_000;
    let pager = Arc::new(Pager::with_size(Box::new(MemFile::with_len(size)), 4096, 64 * 1024).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pager = pager.clone();
        handles.push(std::thread::spawn(move || {
            let mut rng = rand::rng();
            let mut buf = [0u8; 64];
            for _ in 0..500 {
                let off = rng.random_range(0..size - 64) as i64;
                if rng.random_bool(0.5) {
                    let _ = pager.read_at(&mut buf, off);
                } else {
                    let _ = pager.write_at(&buf, off);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn partial_tail_writeback_truncates_last_page() {
    let tmp = NamedTempFile::new().unwrap();
    // default page size (4096) > the 5000-byte file, so the tail page is
    // written back truncated to the remaining 904 bytes.
    let file = File::create(tmp.path(), 5000, 0).unwrap();

    let data = vec![0x7Au8; 5000];
    file.write_at(&data, 0).unwrap();
    file.flush().unwrap();

    let on_disk = std::fs::metadata(tmp.path()).unwrap().len();
    assert_eq!(on_disk, 5000);
}

#[test]
fn eviction_preserves_written_back_page_on_refault() {
    // page_size=4 with a minimal buffer still floors out at 4 pages of total
    // capacity, so filling pages 0-3 and then touching a 5th evicts the LRU
    // page (0).
    let mem = MemFile::with_len(4096);
    let pager = Pager::with_size(Box::new(mem), 4, 8).unwrap();

    pager.write_at(&[0xAA; 4], 0).unwrap(); // page 0
    pager.write_at(&[0xBB; 4], 4).unwrap(); // page 1
    pager.write_at(&[0xCC; 4], 8).unwrap(); // page 2
    pager.write_at(&[0xDD; 4], 12).unwrap(); // page 3
    pager.flush().unwrap();

    // evicts page 0 (LRU); the freed slot takes a single-byte partial write
    // for page 4, so bytes [1,4) of that slot are zero-filled, not stale.
    pager.write_at(&[0xFF], 16).unwrap();

    let mut readback = [0u8; 4];
    pager.read_at(&mut readback, 16).unwrap();
    assert_eq!(readback, [0xFF, 0, 0, 0]);

    // page 0 must refault from the backing file with the data `flush`
    // persisted, not zeros or page 4's bytes.
    let mut original = [0u8; 4];
    pager.read_at(&mut original, 0).unwrap();
    assert_eq!(original, [0xAA; 4]);
}

#[test]
fn closed_facade_rejects_flush_and_sync() {
    let tmp = NamedTempFile::new().unwrap();
    let file = File::create(tmp.path(), 64, 0).unwrap();
    file.close().unwrap();

    let err = file.flush().unwrap_err();
    assert!(matches!(err.kind, pagepool::ErrorKind::Closed));

    let err = file.sync().unwrap_err();
    assert!(matches!(err.kind, pagepool::ErrorKind::Closed));
}

#[test]
fn eof_semantics_on_fixed_size_pager() {
    let tmp = NamedTempFile::new().unwrap();
    let file = File::create(tmp.path(), 100, 0).unwrap();
    file.write_at(&vec![7u8; 100], 0).unwrap();

    let mut buf = [0u8; 50];
    let err = file.read_at(&mut buf, 80).unwrap_err();
    assert!(err.is_eof());
    assert_eq!(err.partial(), 20);
    assert_eq!(&buf[..20], &vec![7u8; 20][..]);
}
