//! Crate-wide error type.
//!
//! A single `Error` struct wraps an `ErrorKind` enum plus a captured
//! backtrace, rather than a derive-macro-generated tree: the error surface
//! here is small (four kinds, one of which wraps `io::Error`) and a hand
//! rolled `Display`/`Debug` costs little.

use std::{
    backtrace::Backtrace,
    error::Error as StdError,
    fmt::{self, Debug, Display},
    io,
};

pub type Result<T> = std::result::Result<T, Error>;

pub struct Error {
    pub backtrace: Backtrace,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn invalid_argument() -> Self {
        Self::new(ErrorKind::InvalidArgument)
    }

    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed)
    }

    pub fn eof(n: usize) -> Self {
        Self::new(ErrorKind::Eof(n))
    }

    pub fn io_with_partial(err: io::Error, partial: usize) -> Self {
        Self::new(ErrorKind::Io { err, partial })
    }

    /// The partial byte count carried alongside this error, if any.
    ///
    /// `Eof` carries the in-bounds prefix length; a backing-I/O failure carries
    /// whatever the caller had already transferred before the error surfaced.
    pub fn partial(&self) -> usize {
        match &self.kind {
            ErrorKind::Eof(n) => *n,
            ErrorKind::Io { partial, .. } => *partial,
            ErrorKind::InvalidArgument | ErrorKind::Closed => 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, ErrorKind::Eof(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error").field("kind", &self.kind).finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if let ErrorKind::Io { err, .. } = &self.kind {
            return Some(err);
        }
        None
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::new(ErrorKind::Io { err: value, partial: 0 })
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    /// A negative byte offset was passed to `read_at`/`write_at`/`seek`.
    InvalidArgument,
    /// The pager/file façade was already closed.
    Closed,
    /// The request extended past the pager's logical size. Carries the number
    /// of bytes that were actually in-bounds and transferred.
    Eof(usize),
    /// A failure surfaced verbatim from the backing file, carrying however
    /// many bytes were transferred before it short-circuited the operation.
    Io { err: io::Error, partial: usize },
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument: negative offset"),
            ErrorKind::Closed => write!(f, "pager is closed"),
            ErrorKind::Eof(n) => write!(f, "end of file after {n} bytes"),
            ErrorKind::Io { err, .. } => write!(f, "backing file I/O error: {err}"),
        }
    }
}
