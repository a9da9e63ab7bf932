//! VMS 64-bit timestamps.
//!
//! A VMS time value counts 100-nanosecond ticks since the Smithsonian base
//! date, 1858-11-17T00:00:00 (Modified Julian Day 0).

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Datelike, Timelike};

/// Days from MJD 0 to the Unix epoch.
const MJD_UNIX_OFFSET_DAYS: i64 = 40_587;
const TICKS_PER_SECOND: i64 = 10_000_000;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// True when the 8-byte value is the all-zero "not specified" marker.
pub fn is_unspecified(raw: &[u8]) -> bool {
    raw.iter().all(|&b| b == 0)
}

/// Convert an 8-byte little-endian VMS timestamp to the fixed-width
/// `dd-MMM-yyyy hh:mm:ss.cc` calendar form (23 characters).
///
/// Returns `None` if the buffer is not exactly 8 bytes or the value does
/// not land on a representable date.
pub fn format_vms_time(raw: &[u8]) -> Option<String> {
    if raw.len() != 8 {
        return None;
    }
    let ticks = LittleEndian::read_u64(raw);
    let ticks = i64::try_from(ticks).ok()?;
    let seconds = ticks / TICKS_PER_SECOND;
    let centiseconds = (ticks % TICKS_PER_SECOND) / 100_000;
    let unix_seconds = seconds - MJD_UNIX_OFFSET_DAYS * 86_400;
    let dt = DateTime::from_timestamp(unix_seconds, 0)?;
    Some(format!(
        "{:>2}-{}-{} {:02}:{:02}:{:02}.{:02}",
        dt.day(),
        MONTHS[dt.month0() as usize],
        dt.year(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        centiseconds,
    ))
}
