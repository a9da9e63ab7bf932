//! Reader for VMS BACKUP savesets.
//!
//! A saveset is the container BACKUP writes to tape or disk: a stream of
//! fixed-size blocks, each holding typed records, which in turn carry
//! attribute lists and raw file content.  This crate decodes that layering
//! and reconstructs the files inside, driven by [`session::run`].

pub mod block;
pub mod bytes;
pub mod content;
pub mod error;
pub mod file;
pub mod hexdump;
pub mod name;
pub mod session;
pub mod source;
pub mod summary;
pub mod tlv;
pub mod vmstime;

pub use error::Error;
pub use session::{run, Options, Totals, DEFAULT_BLOCK_SIZE};
