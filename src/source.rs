//! Block input: magnetic-tape devices with ANSI label framing, or flat
//! disk saveset files.
//!
//! The mode is chosen once at open time by probing whether the device
//! accepts tape positioning operations.  A device that rejects them is a
//! disk saveset: no labels, no filemarks, blocks are plain fixed-size
//! slices of the file and the block size comes from configuration alone.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Error;

/// ANSI tape labels are fixed 80-byte records.
pub const LABEL_SIZE: usize = 80;

/// Labels read ahead of a saveset's data: `VOL1` (volume name), `HDR1`
/// (saveset name and sequence number), `HDR2` (block size).
#[derive(Debug, Clone, Default)]
pub struct SavesetLabels {
    pub volume: Option<String>,
    pub name: String,
    pub number: u32,
    pub block_size: Option<u32>,
}

/// A space- or NUL-delimited text field inside a label.
fn label_field(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .position(|&b| b == b' ' || b == 0)
        .unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn label_number(raw: &[u8]) -> u32 {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// One open saveset input, tape or disk.
#[derive(Debug)]
pub enum BlockSource {
    Tape(TapeSource),
    Disk(DiskSource),
}

impl BlockSource {
    /// Open `path` and probe for tape positioning support.
    ///
    /// The probe is a rewind: the open therefore leaves a tape at its
    /// beginning.  `ENOTTY`/`EINVAL` mean "not a tape" and select disk
    /// mode permanently for this source; any other failure is fatal.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::Open {
            path: path.to_owned(),
            source: e,
        })?;

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            match mt::mtioctop(file.as_raw_fd(), mt::MT_REWIND, 1) {
                Ok(()) => return Ok(BlockSource::Tape(TapeSource { file })),
                Err(e)
                    if matches!(
                        e.raw_os_error(),
                        Some(libc::ENOTTY) | Some(libc::EINVAL)
                    ) => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Ok(BlockSource::Disk(DiskSource { file }))
    }

    pub fn is_tape(&self) -> bool {
        matches!(self, BlockSource::Tape(_))
    }

    /// Read the next physical block into `buf`.
    ///
    /// Returns the byte count: zero at a tape filemark or disk
    /// end-of-stream.  The caller decides whether a short, non-zero count
    /// is corruption.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self {
            // One read() per tape record.
            BlockSource::Tape(t) => Ok(t.file.read(buf)?),
            BlockSource::Disk(d) => d.read_full(buf),
        }
    }

    /// Return to the start of the input for a corrected-blocksize restart.
    pub fn rewind(&mut self) -> Result<(), Error> {
        match self {
            BlockSource::Tape(t) => t.rewind(),
            BlockSource::Disk(d) => {
                d.file.seek(SeekFrom::Start(0))?;
                Ok(())
            }
        }
    }

    /// Fast-forward past the current saveset (tape only).
    pub fn skip_saveset(&mut self) -> Result<(), Error> {
        match self {
            BlockSource::Tape(t) => t.forward_file(),
            BlockSource::Disk(_) => Err(Error::SkipUnsupported),
        }
    }
}

/// A tape device that accepted the positioning probe.
#[derive(Debug)]
pub struct TapeSource {
    file: File,
}

impl TapeSource {
    /// Scan the 80-byte ANSI labels preceding a saveset, up to the
    /// filemark that separates labels from data.
    ///
    /// Returns `None` when no `HDR2` label shows up before the filemark;
    /// that is the end of the tape.
    pub fn read_header_labels(&mut self) -> Result<Option<SavesetLabels>, Error> {
        let mut labels = SavesetLabels::default();
        let mut found_hdr2 = false;
        let mut buf = [0u8; LABEL_SIZE];
        loop {
            let n = self.file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if n != LABEL_SIZE {
                return Err(Error::BadLabel { got: n });
            }
            match &buf[..4] {
                b"VOL1" => labels.volume = Some(label_field(&buf[4..18])),
                b"HDR1" => {
                    labels.name = label_field(&buf[4..18]);
                    labels.number = label_number(&buf[31..35]);
                }
                b"HDR2" => {
                    found_hdr2 = true;
                    labels.block_size = Some(label_number(&buf[5..10]));
                }
                _ => {}
            }
        }
        Ok(if found_hdr2 { Some(labels) } else { None })
    }

    /// Scan the trailer labels after a saveset's data, returning the
    /// `EOF1` saveset name if present.
    pub fn read_trailer_labels(&mut self) -> Result<Option<String>, Error> {
        let mut name = None;
        let mut buf = [0u8; LABEL_SIZE];
        loop {
            let n = self.file.read(&mut buf)?;
            if n == 0 {
                return Ok(name);
            }
            if n != LABEL_SIZE {
                return Err(Error::BadLabel { got: n });
            }
            if &buf[..4] == b"EOF1" {
                name = Some(label_field(&buf[4..18]));
            }
        }
    }

    fn rewind(&mut self) -> Result<(), Error> {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            mt::mtioctop(self.file.as_raw_fd(), mt::MT_REWIND, 1)?;
            return Ok(());
        }
        #[cfg(not(target_os = "linux"))]
        unreachable!("tape sources only exist on linux")
    }

    /// Forward-space over one tape file: the rest of the current
    /// saveset's data, up to and including its filemark.
    fn forward_file(&mut self) -> Result<(), Error> {
        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            mt::mtioctop(self.file.as_raw_fd(), mt::MT_FORWARD_FILE, 1)?;
            return Ok(());
        }
        #[cfg(not(target_os = "linux"))]
        unreachable!("tape sources only exist on linux")
    }
}

/// A flat disk saveset.
#[derive(Debug)]
pub struct DiskSource {
    file: File,
}

impl DiskSource {
    /// Fill `buf` from the file.  Regular files may return short counts,
    /// so reads accumulate until the buffer is full or the stream ends.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

#[cfg(target_os = "linux")]
mod mt {
    //! Minimal magnetic-tape ioctl surface (linux/mtio.h).

    use std::io;
    use std::os::unix::io::RawFd;

    use libc::{c_int, c_short};

    #[repr(C)]
    struct Mtop {
        mt_op: c_short,
        mt_count: c_int,
    }

    pub const MT_FORWARD_FILE: c_short = 1; // MTFSF
    pub const MT_REWIND: c_short = 6; // MTREW

    // _IOW('m', 1, struct mtop)
    const MTIOCTOP: libc::c_ulong = 0x4008_6d01;

    pub fn mtioctop(fd: RawFd, op: c_short, count: c_int) -> io::Result<()> {
        let arg = Mtop {
            mt_op: op,
            mt_count: count,
        };
        let rc = unsafe { libc::ioctl(fd, MTIOCTOP, &arg) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}
