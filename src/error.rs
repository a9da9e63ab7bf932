use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Every variant except `BlockSizeMismatch` is fatal for the whole run.
/// `BlockSizeMismatch` on the very first block of a session is caught by the
/// orchestrator, which restarts the decode loop once with the declared size;
/// a second mismatch is genuine corruption and terminates the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("read past end of buffer at offset {offset} (buffer is {len} bytes)")]
    Truncated { offset: usize, len: usize },

    #[error("invalid header block size: expected {expected} got {got}")]
    BadBlockHeader { expected: u16, got: u16 },

    #[error("Snark: invalid block size (got {declared}, expected {negotiated})")]
    BlockSizeMismatch { declared: u32, negotiated: u32 },

    #[error("record size {rsize} exceeds the {remaining} bytes left in the block")]
    RecordOverrun { rsize: u16, remaining: usize },

    /// A summary or file record whose payload does not start with the
    /// fixed `(1, 1)` data-header marker.
    #[error("Snark: invalid data header")]
    InvalidDataHeader,

    #[error("Snark: bad label record ({got} bytes)")]
    BadLabel { got: usize },

    #[error("bad block read i = {got}")]
    ShortRead { got: usize, expected: usize },

    #[error("-s not supported for disk savesets")]
    SkipUnsupported,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
