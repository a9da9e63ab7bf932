//! Content reconstruction: turning raw virtual blocks back into the
//! logical records the file was written with.
//!
//! Each vbn record carries one virtual block of raw file data.  How those
//! bytes map to output depends on the file's record format: fixed-length
//! records are copied verbatim, variable/VFC records carry their own
//! length prefixes and grow line terminators, stream formats are
//! byte streams with conventional line handling.  A logical record
//! routinely spans several vbn records, so all position state lives here
//! and survives from one call to the next.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;
use crate::file::{FileAttributes, RecordFormat, ATTR_FTN};

/// Result of feeding one vbn record through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbnStatus {
    Ok,
    /// The declared record format cannot be reconstructed.  The caller
    /// abandons the output file; the run continues with the next file.
    Abandon { format_byte: u8 },
}

/// Per-file decode state, reset whenever a new file record is decoded.
#[derive(Debug)]
pub struct ContentReconstructor {
    format: RecordFormat,
    format_byte: u8,
    attributes: u8,
    record_size: u16,
    vfc_size: usize,
    file_size: u64,
    binary: bool,
    /// Bytes of the virtual-block stream consumed so far.  Once this
    /// reaches `file_size` the rest of the stream is alignment padding.
    consumed: u64,
    /// Bytes remaining in the logical record currently in progress.
    remaining: i64,
    /// The record's declared length, kept as the baseline that identifies
    /// the first content byte for Fortran carriage-control handling.
    baseline: i64,
}

impl ContentReconstructor {
    pub fn new(attrs: &FileAttributes, binary: bool) -> Self {
        ContentReconstructor {
            format: attrs.format(),
            format_byte: attrs.format_byte,
            attributes: attrs.attributes,
            record_size: attrs.record_size,
            vfc_size: attrs.vfc_size as usize,
            file_size: attrs.file_size(),
            binary,
            consumed: 0,
            remaining: 0,
            baseline: 0,
        }
    }

    /// Feed one vbn record's payload through the state machine, appending
    /// reconstructed bytes to `out`.
    ///
    /// Stops consuming once the accumulated input reaches the declared
    /// file size; trailing bytes in the block are padding.
    pub fn process<W: Write>(&mut self, buffer: &[u8], out: &mut W) -> Result<VbnStatus, Error> {
        let mut i: usize = 0;
        while self.consumed + (i as u64) < self.file_size && i < buffer.len() {
            match self.format {
                RecordFormat::Fixed => {
                    if self.remaining == 0 {
                        self.remaining = self.record_size as i64;
                    }
                    out.write_all(&buffer[i..i + 1])?;
                    i += 1;
                    self.remaining -= 1;
                }
                RecordFormat::Variable | RecordFormat::Vfc => {
                    i = self.step_variable(buffer, i, out)?;
                }
                RecordFormat::Stream | RecordFormat::StreamLf => {
                    if self.remaining == 0 {
                        self.remaining = 512;
                    }
                    let c = buffer[i];
                    i += 1;
                    self.remaining -= 1;
                    if c == b'\n' {
                        // A line feed closes the record early.
                        self.remaining = 0;
                    }
                    out.write_all(&[c])?;
                }
                RecordFormat::StreamCr => {
                    let c = buffer[i];
                    i += 1;
                    if c == b'\r' && !self.binary {
                        out.write_all(b"\n")?;
                    } else {
                        out.write_all(&[c])?;
                    }
                }
                _ => {
                    return Ok(VbnStatus::Abandon {
                        format_byte: self.format_byte,
                    });
                }
            }
        }
        self.consumed += i as u64;
        Ok(VbnStatus::Ok)
    }

    /// One step of the variable/VFC machine: either start a new record by
    /// reading its length prefix (and VFC control area), or move one
    /// content byte; finish the record when its length runs out.
    fn step_variable<W: Write>(
        &mut self,
        buffer: &[u8],
        mut i: usize,
        out: &mut W,
    ) -> Result<usize, Error> {
        if self.remaining == 0 {
            if i + 2 > buffer.len() {
                // The length prefix would straddle the block boundary;
                // BACKUP never writes one that does.  Leave the tail for
                // the next block.
                return Ok(buffer.len());
            }
            self.remaining = LittleEndian::read_u16(&buffer[i..]) as i64;
            self.baseline = self.remaining;
            if self.binary {
                out.write_all(&buffer[i..i + 2])?;
            }
            i += 2;
            if self.format == RecordFormat::Vfc {
                let control = self.vfc_size.min(buffer.len() - i);
                if self.binary {
                    out.write_all(&buffer[i..i + control])?;
                }
                i += control;
                self.remaining -= self.vfc_size as i64;
            }
        } else if self.remaining == self.baseline && self.attributes & ATTR_FTN != 0 {
            // First content byte of a Fortran record: the carriage-control
            // indicator passes through uninterpreted.
            out.write_all(&buffer[i..i + 1])?;
            i += 1;
            self.remaining -= 1;
        } else {
            out.write_all(&buffer[i..i + 1])?;
            i += 1;
            self.remaining -= 1;
        }
        if self.remaining == 0 {
            if !self.binary {
                out.write_all(b"\n")?;
            }
            if i & 1 == 1 {
                // Records are word-aligned within the block.
                if self.binary && i < buffer.len() {
                    out.write_all(&buffer[i..i + 1])?;
                }
                i += 1;
            }
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{ATTR_CR, FMT_FIX, FMT_STM, FMT_STMCR, FMT_STMLF, FMT_VAR, FMT_VFC};

    fn attrs(format_byte: u8, record_size: u16, nblk: u32, last_bytes: u16) -> FileAttributes {
        FileAttributes {
            format_byte,
            record_size,
            virtual_blocks: nblk,
            last_block_bytes: last_bytes,
            ..FileAttributes::default()
        }
    }

    fn run(rec: &mut ContentReconstructor, chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in chunks {
            assert_eq!(rec.process(chunk, &mut out).unwrap(), VbnStatus::Ok);
        }
        out
    }

    #[test]
    fn fixed_records_copy_without_delimiters() {
        // Two 80-byte records: exactly 160 bytes out, nothing inserted.
        let a = attrs(FMT_FIX, 80, 1, 160);
        let mut rec = ContentReconstructor::new(&a, false);
        let mut block = vec![b'x'; 80];
        block.extend(vec![b'y'; 80]);
        block.resize(512, 0); // padding past file_size
        let out = run(&mut rec, &[&block]);
        assert_eq!(out.len(), 160);
        assert_eq!(&out[..80], &[b'x'; 80][..]);
        assert_eq!(&out[80..], &[b'y'; 80][..]);
    }

    fn var_stream(records: &[&[u8]]) -> Vec<u8> {
        let mut block = Vec::new();
        for r in records {
            block.extend_from_slice(&(r.len() as u16).to_le_bytes());
            block.extend_from_slice(r);
            if block.len() & 1 == 1 {
                block.push(0); // alignment pad
            }
        }
        block
    }

    #[test]
    fn variable_records_get_line_terminators() {
        let stream = var_stream(&[b"ab", b"cde"]);
        let a = attrs(FMT_VAR, 255, 1, stream.len() as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&stream]), b"ab\ncde\n");
    }

    #[test]
    fn variable_state_survives_block_boundaries() {
        let stream = var_stream(&[b"hello world", b"second record"]);
        let a = attrs(FMT_VAR, 255, 1, stream.len() as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        let (first, second) = stream.split_at(8); // mid-record split
        let out = run(&mut rec, &[first, second]);
        assert_eq!(out, b"hello world\nsecond record\n");
    }

    #[test]
    fn variable_binary_mode_keeps_prefixes_and_padding() {
        let stream = var_stream(&[b"ab", b"cde"]);
        let a = attrs(FMT_VAR, 255, 1, stream.len() as u16);
        let mut rec = ContentReconstructor::new(&a, true);
        // Binary passthrough reproduces the raw stream byte for byte.
        assert_eq!(run(&mut rec, &[&stream]), stream);
    }

    #[test]
    fn vfc_control_bytes_are_consumed() {
        // One record: length 7 covers a 2-byte control area + "hello".
        let mut stream = Vec::new();
        stream.extend_from_slice(&7u16.to_le_bytes());
        stream.extend_from_slice(&[0x8d, 0x8d]); // control area
        stream.extend_from_slice(b"hello");
        stream.push(0); // odd offset pad
        let a = attrs(FMT_VFC, 255, 1, stream.len() as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&stream]), b"hello\n");
    }

    #[test]
    fn fortran_carriage_control_byte_passes_through() {
        // Record "0abc" with the Fortran attribute: the leading '0' is the
        // carriage-control indicator and is emitted untouched.
        let stream = var_stream(&[b"0abc"]);
        let mut a = attrs(FMT_VAR, 255, 1, stream.len() as u16);
        a.attributes = ATTR_FTN;
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&stream]), b"0abc\n");
    }

    #[test]
    fn stream_lf_is_a_transparent_byte_stream() {
        let content = b"hello\nworld";
        let mut block = content.to_vec();
        block.resize(512, 0);
        let a = attrs(FMT_STMLF, 0, 1, content.len() as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&block]), content);
    }

    #[test]
    fn stream_quota_resets_on_line_feed() {
        // A line longer than the 512-byte default quota still flows, and
        // the quota machinery never drops or inserts bytes.
        let mut content = vec![b'a'; 600];
        content.push(b'\n');
        content.extend_from_slice(b"tail");
        let a = attrs(FMT_STM, 0, 2, (content.len() - 512) as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        let (first, second) = content.split_at(512);
        assert_eq!(run(&mut rec, &[first, second]), content);
    }

    #[test]
    fn stream_cr_translates_carriage_returns() {
        let content = b"one\rtwo\r";
        let a = attrs(FMT_STMCR, 0, 1, content.len() as u16);
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&content[..]]), b"one\ntwo\n");

        let mut rec = ContentReconstructor::new(&a, true);
        assert_eq!(run(&mut rec, &[&content[..]]), content);
    }

    #[test]
    fn output_stops_at_the_declared_file_size() {
        let a = attrs(FMT_STMLF, 0, 1, 5);
        let mut rec = ContentReconstructor::new(&a, false);
        let mut block = b"12345".to_vec();
        block.resize(512, b'z'); // padding must be ignored
        assert_eq!(run(&mut rec, &[&block]), b"12345");
        // Further blocks contribute nothing.
        assert_eq!(run(&mut rec, &[&block]), b"");
    }

    #[test]
    fn unsupported_format_abandons_the_file() {
        let a = attrs(0x27, 0, 1, 10); // indexed organization, unknown format
        let mut rec = ContentReconstructor::new(&a, false);
        let mut out = Vec::new();
        let status = rec.process(&[0u8; 16], &mut out).unwrap();
        assert_eq!(status, VbnStatus::Abandon { format_byte: 0x27 });
        assert!(out.is_empty());
    }

    #[test]
    fn carriage_return_attribute_alone_gets_plain_copies() {
        let stream = var_stream(&[b"xy"]);
        let mut a = attrs(FMT_VAR, 255, 1, stream.len() as u16);
        a.attributes = ATTR_CR;
        let mut rec = ContentReconstructor::new(&a, false);
        assert_eq!(run(&mut rec, &[&stream]), b"xy\n");
    }
}
