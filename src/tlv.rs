//! Tag-length-value attribute streams.
//!
//! Summary and file records carry their metadata as a flat sequence of
//! attributes: size (u16), type (u16), then `size` bytes of value.  The
//! stream begins with a fixed `(1, 1)` data-header marker and may end early
//! with a zero-size, zero-type terminator used as padding.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

/// One attribute from the stream.  The value borrows from the record
/// payload; nothing is copied.
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub atype: u16,
    pub value: &'a [u8],
}

/// Iterator over the attributes of one record payload.
///
/// Fresh per record; no state survives the call.  Iteration stops at the
/// explicit zero/zero terminator or when the declared record length runs
/// out, whichever comes first.
pub struct TlvScanner<'a> {
    payload: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> TlvScanner<'a> {
    /// Validate the `(1, 1)` data-header marker and position the scanner
    /// on the first attribute.
    pub fn new(payload: &'a [u8]) -> Result<Self, Error> {
        if payload.len() < 2 || payload[0] != 1 || payload[1] != 1 {
            return Err(Error::InvalidDataHeader);
        }
        Ok(TlvScanner {
            payload,
            offset: 2,
            done: false,
        })
    }
}

impl<'a> Iterator for TlvScanner<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Attribute<'a>> {
        if self.done || self.offset + 4 > self.payload.len() {
            return None;
        }
        let size = LittleEndian::read_u16(&self.payload[self.offset..]) as usize;
        let atype = LittleEndian::read_u16(&self.payload[self.offset + 2..]);
        if size == 0 && atype == 0 {
            // Explicit end-of-list padding.
            self.done = true;
            return None;
        }
        let start = self.offset + 4;
        // A size running past the declared record length yields what is
        // actually there; the per-type decoders check value lengths anyway.
        let end = (start + size).min(self.payload.len());
        self.offset = start + size;
        Some(Attribute {
            atype,
            value: &self.payload[start..end],
        })
    }
}
