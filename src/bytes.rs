//! Bounds-checked little-endian field readers over byte slices.
//!
//! Every integer in a BACKUP saveset is little-endian regardless of host, so
//! all multi-byte reads go through these helpers rather than struct overlays.
//! Sizes and offsets come from the tape verbatim and are never trusted.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

/// Borrow `len` bytes starting at `offset`, or fail without touching
/// anything past the end of the slice.
pub fn bytes_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or(Error::Truncated {
            offset,
            len: buf.len(),
        })?;
    Ok(&buf[offset..end])
}

pub fn u16_at(buf: &[u8], offset: usize) -> Result<u16, Error> {
    bytes_at(buf, offset, 2).map(LittleEndian::read_u16)
}

pub fn u32_at(buf: &[u8], offset: usize) -> Result<u32, Error> {
    bytes_at(buf, offset, 4).map(LittleEndian::read_u32)
}

pub fn u64_at(buf: &[u8], offset: usize) -> Result<u64, Error> {
    bytes_at(buf, offset, 8).map(LittleEndian::read_u64)
}
