//! Saveset block and record framing.
//!
//! A saveset is a sequence of fixed-size blocks.  Each block starts with a
//! 256-byte header, followed by records; each record starts with a 16-byte
//! header carrying its type and payload size.  Records never span blocks.
//!
//! All fields are little-endian; see [`crate::bytes`].

use crate::bytes::{bytes_at, u16_at, u32_at};
use crate::error::Error;

/// Fixed size of the block header.  The size field inside the header must
/// agree with this constant or the saveset is corrupt.
pub const BLOCK_HEADER_SIZE: usize = 256;

/// Fixed size of a record header.
pub const RECORD_HEADER_SIZE: usize = 16;

/// Block header, 256 bytes at the start of every physical block.
///
/// Only the fields the decoder acts on are retained; the CRC and checksum
/// fields are carried by the format but were never verified by BACKUP's
/// own restore path, and are not verified here either.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    /// Size of this header structure; must equal 256.
    pub header_size: u16,
    /// Block sequence number within the saveset.
    pub block_number: u32,
    /// Saveset structure level.
    pub struct_level: u16,
    /// Volume number, for multi-reel sets.
    pub volume_number: u16,
    /// Block size declared by the writer.  Must match the negotiated
    /// session size (or be zero for a padding block).
    pub block_size: u32,
    pub flags: u32,
    /// Saveset name as recorded in the header, trimmed of padding.
    pub saveset_name: String,
}

impl BlockHeader {
    /// Parse the header at the start of `block`.
    ///
    /// Fails if the buffer is shorter than 256 bytes or the embedded
    /// header-size field disagrees with the structure size.
    pub fn parse(block: &[u8]) -> Result<Self, Error> {
        let header_size = u16_at(block, 0)?;
        if header_size as usize != BLOCK_HEADER_SIZE {
            return Err(Error::BadBlockHeader {
                expected: BLOCK_HEADER_SIZE as u16,
                got: header_size,
            });
        }
        let ssname = bytes_at(block, 48, 32)?;
        Ok(BlockHeader {
            header_size,
            block_number: u32_at(block, 8)?,
            struct_level: u16_at(block, 32)?,
            volume_number: u16_at(block, 34)?,
            block_size: u32_at(block, 40)?,
            flags: u32_at(block, 44)?,
            saveset_name: trimmed_text(ssname),
        })
    }
}

/// The ssname field is a counted ASCII string: one length byte, then text.
fn trimmed_text(raw: &[u8]) -> String {
    let (len, text) = match raw.split_first() {
        Some((&len, rest)) if (len as usize) <= rest.len() => (len as usize, rest),
        _ => return String::new(),
    };
    String::from_utf8_lossy(&text[..len]).trim_end().to_string()
}

/// Record types found inside a block.
///
/// Unknown values are preserved rather than rejected; the decoder skips
/// them so that future record types do not break old readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Null,
    Summary,
    Volume,
    File,
    Vbn,
    Physvol,
    Lbn,
    Fid,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(raw: u16) -> Self {
        match raw {
            0 => RecordType::Null,
            1 => RecordType::Summary,
            2 => RecordType::Volume,
            3 => RecordType::File,
            4 => RecordType::Vbn,
            5 => RecordType::Physvol,
            6 => RecordType::Lbn,
            7 => RecordType::Fid,
            other => RecordType::Unknown(other),
        }
    }
}

impl RecordType {
    pub fn name(self) -> &'static str {
        match self {
            RecordType::Null => "null",
            RecordType::Summary => "summary",
            RecordType::Volume => "volume",
            RecordType::File => "file",
            RecordType::Vbn => "vbn",
            RecordType::Physvol => "physvol",
            RecordType::Lbn => "lbn",
            RecordType::Fid => "fid",
            RecordType::Unknown(_) => "unknown",
        }
    }
}

/// Record header, 16 bytes before each record payload.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    /// Payload size in bytes.  Validated against the remaining block space
    /// before the payload is touched.
    pub size: u16,
    pub rtype: RecordType,
    pub flags: u32,
    /// For vbn records, the virtual block number of the payload.
    pub address: u32,
}

impl RecordHeader {
    /// Parse the record header at `offset` within `block`.
    pub fn parse(block: &[u8], offset: usize) -> Result<Self, Error> {
        Ok(RecordHeader {
            size: u16_at(block, offset)?,
            rtype: RecordType::from(u16_at(block, offset + 2)?),
            flags: u32_at(block, offset + 4)?,
            address: u32_at(block, offset + 8)?,
        })
    }
}
