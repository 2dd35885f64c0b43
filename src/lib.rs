//! A sharded, LRU-governed page buffer pool for byte-addressable file I/O.
//!
//! A [`Pager`] slices every `read_at`/`write_at` request into page-aligned
//! chunks and routes each chunk to one of several independently-locked
//! [`shard`]s, each holding its own bounded LRU cache of [`page::Page`]s.
//! Callers who want a `Read`/`Write`/`Seek`-shaped API instead of explicit
//! offsets can wrap a `Pager` in a [`Stream`]; callers who want a fixed-size,
//! closeable file handle with OS metadata passthroughs can use [`File`].
//!
//! ```no_run
//! use pagepool::{File};
//!
//! # fn main() -> pagepool::Result<()> {
//! let file = File::create("/tmp/example.db", 1 << 20, 0)?;
//! file.write_at(b"hello", 0)?;
//! file.close()?;
//! # Ok(())
//! # }
//! ```

mod backing;
mod error;
mod file;
mod page;
mod pager;
mod shard;
mod stream;

pub use backing::{BackingFile, MemFile};
pub use error::{Error, ErrorKind, Result};
pub use file::File;
pub use pager::{Pager, PagerConfig, SizePolicy};
pub use stream::Stream;
