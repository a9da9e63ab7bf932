//! Per-file attribute records.
//!
//! A file record opens every file in the saveset: name, RMS record format
//! and attributes, sizes, ownership, protection, and dates.  The decoded
//! [`FileAttributes`] drive both the listing output and the content
//! reconstruction of the vbn records that follow.

use crate::bytes::u16_at;
use crate::error::Error;
use crate::hexdump;
use crate::tlv::TlvScanner;
use crate::vmstime;

/// Longest filename the attribute decoder will keep, matching the
/// 128-byte field in the block header.  Longer names are silently
/// truncated; this is a hard cap, not an error.
pub const MAX_FILENAME: usize = 127;

// FAB$C record format codes (low nibble of the format byte).
pub const FMT_UDF: u8 = 0;
pub const FMT_FIX: u8 = 1;
pub const FMT_VAR: u8 = 2;
pub const FMT_VFC: u8 = 3;
pub const FMT_STM: u8 = 4;
pub const FMT_STMLF: u8 = 5;
pub const FMT_STMCR: u8 = 6;

// FAB$C file organization codes (high nibble of the format byte).
pub const ORG_SEQ: u8 = 0x00;
pub const ORG_REL: u8 = 0x10;
pub const ORG_IDX: u8 = 0x20;
pub const ORG_HSH: u8 = 0x30;

// FAB$M record attribute flags.
pub const ATTR_FTN: u8 = 0x01; // Fortran carriage control
pub const ATTR_CR: u8 = 0x02; // implied carriage return
pub const ATTR_PRN: u8 = 0x04; // print file
pub const ATTR_BLK: u8 = 0x08; // records do not span blocks

/// Record format family, from the low nibble of the format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Undefined,
    Fixed,
    Variable,
    Vfc,
    Stream,
    StreamLf,
    StreamCr,
    Unknown(u8),
}

impl RecordFormat {
    pub fn from_byte(format_byte: u8) -> Self {
        match format_byte & 0x0f {
            FMT_UDF => RecordFormat::Undefined,
            FMT_FIX => RecordFormat::Fixed,
            FMT_VAR => RecordFormat::Variable,
            FMT_VFC => RecordFormat::Vfc,
            FMT_STM => RecordFormat::Stream,
            FMT_STMLF => RecordFormat::StreamLf,
            FMT_STMCR => RecordFormat::StreamCr,
            other => RecordFormat::Unknown(other),
        }
    }
}

/// File organization, from the high nibble of the format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Organization {
    Sequential,
    Relative,
    Indexed,
    Hashed,
    Unknown(u8),
}

impl Organization {
    pub fn from_byte(format_byte: u8) -> Self {
        match format_byte & 0xf0 {
            ORG_SEQ => Organization::Sequential,
            ORG_REL => Organization::Relative,
            ORG_IDX => Organization::Indexed,
            ORG_HSH => Organization::Hashed,
            other => Organization::Unknown(other),
        }
    }

    pub fn name(self) -> String {
        match self {
            Organization::Sequential => "Sequential".to_string(),
            Organization::Relative => "Relative".to_string(),
            Organization::Indexed => "Indexed".to_string(),
            Organization::Hashed => "Hashed".to_string(),
            Organization::Unknown(code) => format!("<Unknown {code}>"),
        }
    }
}

const DATE_UNSPECIFIED: &str = " <None specified>";

/// Everything a file record tells us about one file.
#[derive(Debug, Clone)]
pub struct FileAttributes {
    /// Decoded VMS path string, capped at [`MAX_FILENAME`] bytes.
    pub filename: String,
    /// Raw format byte: record format nibble + organization nibble.
    pub format_byte: u8,
    /// Record attribute flags (`ATTR_*`).
    pub attributes: u8,
    /// Declared maximum record size.
    pub record_size: u16,
    /// Allocation in 512-byte blocks.
    pub allocated_blocks: u32,
    /// Virtual block count: low word plus 65536 times the high word.
    pub virtual_blocks: u32,
    /// Valid bytes in the final virtual block.
    pub last_block_bytes: u16,
    /// VFC control-area size; a declared zero means two bytes.
    pub vfc_size: u8,
    /// Extension quantity in blocks.
    pub extension: u16,
    /// Protection mask, four 4-bit S/O/G/W fields; a set bit revokes.
    pub protection: u16,
    pub file_id: [u16; 3],
    /// Revision count, shown with the revision date.
    pub revision: u16,
    pub uic_group: u16,
    pub uic_user: u16,
    pub created: String,
    pub revised: String,
    pub expires: String,
    pub backup: String,
}

impl Default for FileAttributes {
    fn default() -> Self {
        FileAttributes {
            filename: String::new(),
            format_byte: 0,
            attributes: 0,
            record_size: 0,
            allocated_blocks: 0,
            virtual_blocks: 0,
            last_block_bytes: 0,
            vfc_size: 2,
            extension: 0,
            protection: 0,
            file_id: [0; 3],
            revision: 0,
            uic_group: 0o377,
            uic_user: 0o377,
            created: DATE_UNSPECIFIED.to_string(),
            revised: DATE_UNSPECIFIED.to_string(),
            expires: DATE_UNSPECIFIED.to_string(),
            backup: DATE_UNSPECIFIED.to_string(),
        }
    }
}

fn decode_date(value: &[u8]) -> Option<String> {
    if vmstime::is_unspecified(value) {
        return None;
    }
    Some(
        vmstime::format_vms_time(value)
            .unwrap_or_else(|| "error converting date".to_string()),
    )
}

impl FileAttributes {
    /// Decode one file record payload.
    ///
    /// A bad data-header marker here is fatal for the whole run: it means
    /// the saveset structure itself cannot be trusted.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut attrs = FileAttributes::default();
        for attr in TlvScanner::new(payload)? {
            log::debug!(
                "file attribute type {:#x}, {} bytes\n{}",
                attr.atype,
                attr.value.len(),
                hexdump::dump(attr.value)
            );
            match attr.atype {
                0x2a => {
                    let end = attr.value.len().min(MAX_FILENAME);
                    attrs.filename = String::from_utf8_lossy(&attr.value[..end]).into_owned();
                }
                0x2c => {
                    if attr.value.len() >= 6 {
                        attrs.file_id = [
                            u16_at(attr.value, 0)?,
                            u16_at(attr.value, 2)?,
                            u16_at(attr.value, 4)?,
                        ];
                    }
                }
                0x2f => {
                    if attr.value.len() == 4 {
                        attrs.uic_user = u16_at(attr.value, 0)?;
                        attrs.uic_group = u16_at(attr.value, 2)?;
                    }
                }
                0x30 => {
                    if attr.value.len() >= 2 {
                        attrs.protection = u16_at(attr.value, 0)?;
                    }
                }
                0x34 => {
                    if attr.value.len() >= 20 {
                        attrs.format_byte = attr.value[0];
                        attrs.attributes = attr.value[1];
                        attrs.record_size = u16_at(attr.value, 2)?;
                        attrs.allocated_blocks = u16_at(attr.value, 6)? as u32;
                        attrs.virtual_blocks = u16_at(attr.value, 10)? as u32
                            + 65_536 * u16_at(attr.value, 8)? as u32;
                        attrs.last_block_bytes = u16_at(attr.value, 12)?;
                        attrs.vfc_size = match attr.value[15] {
                            0 => 2,
                            n => n,
                        };
                        attrs.extension = u16_at(attr.value, 18)?;
                    } else {
                        log::debug!(
                            "short record-attribute block ({} bytes), skipped",
                            attr.value.len()
                        );
                    }
                }
                0x35 => {
                    if attr.value.len() >= 2 {
                        attrs.revision = u16_at(attr.value, 0)?;
                    }
                }
                0x36 => {
                    if let Some(d) = decode_date(attr.value) {
                        attrs.created = d;
                    }
                }
                0x37 => {
                    if let Some(d) = decode_date(attr.value) {
                        attrs.revised = d;
                    }
                }
                0x38 => {
                    if let Some(d) = decode_date(attr.value) {
                        attrs.expires = d;
                    }
                }
                0x39 => {
                    if let Some(d) = decode_date(attr.value) {
                        attrs.backup = d;
                    }
                }
                _ => {}
            }
        }
        Ok(attrs)
    }

    pub fn format(&self) -> RecordFormat {
        RecordFormat::from_byte(self.format_byte)
    }

    pub fn organization(&self) -> Organization {
        Organization::from_byte(self.format_byte)
    }

    /// Bytes of real content: full virtual blocks plus the valid bytes of
    /// the last one.  A zero virtual-block count means an empty file.
    pub fn file_size(&self) -> u64 {
        match self.virtual_blocks {
            0 => 0,
            n => (n as u64 - 1) * 512 + self.last_block_bytes as u64,
        }
    }

    /// Used 512-byte blocks, as shown in listings.
    pub fn blocks(&self) -> u64 {
        (self.file_size() + 511) / 512
    }

    /// One line of brief listing output.
    pub fn brief_listing(&self) -> String {
        format!("{:<52} {:>8} {}", self.filename, self.blocks(), self.created)
    }

    /// Protection in `S:RWED,O:RWED,G:RWED,W:RWED` notation.  A cleared
    /// bit grants the right; a set bit revokes it.
    pub fn protection_string(&self) -> String {
        let mut out = String::from("(");
        for (i, who) in ['S', 'O', 'G', 'W'].into_iter().enumerate() {
            out.push(who);
            out.push(':');
            let field = self.protection >> (i * 4);
            for (bit, right) in [(1, 'R'), (2, 'W'), (4, 'E'), (8, 'D')] {
                if field & bit == 0 {
                    out.push(right);
                }
            }
            if i != 3 {
                out.push(',');
            }
        }
        out.push(')');
        out
    }

    fn record_format_line(&self) -> String {
        match self.format() {
            RecordFormat::Undefined => "(undefined)".to_string(),
            RecordFormat::Fixed => match self.record_size {
                0 => "Fixed length".to_string(),
                n => format!("Fixed length {n} byte records"),
            },
            RecordFormat::Variable => match self.record_size {
                0 => "Variable length".to_string(),
                n => format!("Variable length, maximum {n} bytes"),
            },
            RecordFormat::Vfc => match self.record_size {
                0 => "VFC".to_string(),
                n => format!("VFC, maximum {n} bytes"),
            },
            RecordFormat::Stream => "Stream".to_string(),
            RecordFormat::StreamLf => "Stream_LF".to_string(),
            RecordFormat::StreamCr => "Stream_CR".to_string(),
            RecordFormat::Unknown(_) => "<unknown>".to_string(),
        }
    }

    fn record_attributes_line(&self) -> String {
        let mut out = String::new();
        if self.attributes & ATTR_FTN != 0 {
            out.push_str("Fortran ");
        }
        if self.attributes & ATTR_PRN != 0 {
            out.push_str("Print file ");
        }
        if self.attributes & ATTR_CR != 0 {
            out.push_str("Carriage return carriage control ");
        }
        if self.attributes & ATTR_BLK != 0 {
            out.push_str("Non-spanned");
        }
        out
    }

    /// The multi-line `/FULL` listing block.
    pub fn full_listing(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<30.30} File ID:  ({},{},{})\n",
            self.filename, self.file_id[0], self.file_id[1], self.file_id[2]
        ));
        out.push_str(&format!(
            "  Size:       {:>6}/{:<6}    Owner:    [{:06o},{:06o}]\n",
            self.blocks(),
            self.allocated_blocks,
            self.uic_group,
            self.uic_user
        ));
        out.push_str(&format!("  Protection: {}\n", self.protection_string()));
        out.push_str(&format!("  Created:  {}\n", self.created));
        out.push_str(&format!("  Revised:  {} ({})\n", self.revised, self.revision));
        out.push_str(&format!("  Expires:  {}\n", self.expires));
        out.push_str(&format!("  Backup:   {}\n", self.backup));
        out.push_str(&format!(
            "  File Organization:  {}\n",
            self.organization().name()
        ));
        out.push_str(&format!(
            "  File attributes:    Allocation {}, Extend {}\n",
            self.allocated_blocks, self.extension
        ));
        out.push_str(&format!("  Record format:      {}\n", self.record_format_line()));
        out.push_str(&format!(
            "  Record attributes:  {}\n",
            self.record_attributes_line()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(atype: u16, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(&atype.to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    /// The 0x34 record-attribute block: format, attributes, sizes.
    fn record_attr_block(
        format_byte: u8,
        attributes: u8,
        record_size: u16,
        ablk: u16,
        nblk_high: u16,
        nblk_low: u16,
        last_bytes: u16,
        vfc: u8,
        extension: u16,
    ) -> Vec<u8> {
        let mut v = vec![0u8; 20];
        v[0] = format_byte;
        v[1] = attributes;
        v[2..4].copy_from_slice(&record_size.to_le_bytes());
        v[6..8].copy_from_slice(&ablk.to_le_bytes());
        v[8..10].copy_from_slice(&nblk_high.to_le_bytes());
        v[10..12].copy_from_slice(&nblk_low.to_le_bytes());
        v[12..14].copy_from_slice(&last_bytes.to_le_bytes());
        v[15] = vfc;
        v[18..20].copy_from_slice(&extension.to_le_bytes());
        v
    }

    fn sample_payload() -> Vec<u8> {
        let mut payload = vec![1, 1];
        payload.extend(entry(0x2a, b"[SRC]MAIN.C;4"));
        payload.extend(entry(0x2c, &[0x7a, 0x02, 0x57, 0x00, 0x01, 0x00]));
        payload.extend(entry(0x2f, &[0x04, 0x00, 0x01, 0x00]));
        payload.extend(entry(0x30, &[0x44, 0xee]));
        payload.extend(entry(
            0x34,
            &record_attr_block(FMT_VAR, ATTR_CR, 255, 6, 0, 3, 100, 0, 5),
        ));
        payload.extend(entry(0x35, &[0x04, 0x00]));
        payload
    }

    #[test]
    fn decodes_the_core_attributes() {
        let attrs = FileAttributes::decode(&sample_payload()).unwrap();
        assert_eq!(attrs.filename, "[SRC]MAIN.C;4");
        assert_eq!(attrs.file_id, [0x027a, 0x0057, 1]);
        assert_eq!(attrs.uic_user, 4);
        assert_eq!(attrs.uic_group, 1);
        assert_eq!(attrs.protection, 0xee44);
        assert_eq!(attrs.format(), RecordFormat::Variable);
        assert_eq!(attrs.organization(), Organization::Sequential);
        assert_eq!(attrs.record_size, 255);
        assert_eq!(attrs.vfc_size, 2); // declared 0 means 2
        assert_eq!(attrs.extension, 5);
        assert_eq!(attrs.revision, 4);
    }

    #[test]
    fn derives_size_from_block_count_and_tail() {
        let attrs = FileAttributes::decode(&sample_payload()).unwrap();
        assert_eq!(attrs.virtual_blocks, 3);
        assert_eq!(attrs.file_size(), 2 * 512 + 100);
        assert_eq!(attrs.blocks(), 3);
    }

    #[test]
    fn high_word_scales_the_virtual_block_count() {
        let mut payload = vec![1, 1];
        payload.extend(entry(
            0x34,
            &record_attr_block(FMT_FIX, 0, 512, 0, 2, 7, 512, 0, 0),
        ));
        let attrs = FileAttributes::decode(&payload).unwrap();
        assert_eq!(attrs.virtual_blocks, 2 * 65_536 + 7);
    }

    #[test]
    fn empty_file_has_zero_size() {
        let attrs = FileAttributes::default();
        assert_eq!(attrs.file_size(), 0);
        assert_eq!(attrs.blocks(), 0);
    }

    #[test]
    fn truncates_an_oversized_filename() {
        let long = vec![b'A'; 300];
        let mut payload = vec![1, 1];
        payload.extend(entry(0x2a, &long));
        let attrs = FileAttributes::decode(&payload).unwrap();
        assert_eq!(attrs.filename.len(), MAX_FILENAME);
    }

    #[test]
    fn bad_data_header_is_fatal() {
        assert!(matches!(
            FileAttributes::decode(&[2, 1, 0, 0]),
            Err(Error::InvalidDataHeader)
        ));
    }

    #[test]
    fn protection_letters_appear_for_cleared_bits() {
        let mut attrs = FileAttributes::default();
        attrs.protection = 0x0000;
        assert_eq!(attrs.protection_string(), "(S:RWED,O:RWED,G:RWED,W:RWED)");
        attrs.protection = 0xff00;
        assert_eq!(attrs.protection_string(), "(S:RWED,O:RWED,G:,W:)");
        attrs.protection = 0x8888;
        assert_eq!(attrs.protection_string(), "(S:RWE,O:RWE,G:RWE,W:RWE)");
    }

    #[test]
    fn date_defaults_survive_zero_values() {
        let mut payload = vec![1, 1];
        payload.extend(entry(0x36, &[0; 8]));
        payload.extend(entry(0x37, &[1, 0, 0, 0, 0, 0, 0, 0]));
        let attrs = FileAttributes::decode(&payload).unwrap();
        assert_eq!(attrs.created, " <None specified>");
        assert_eq!(attrs.revised, "17-NOV-1858 00:00:00.00");
    }

    #[test]
    fn malformed_date_degrades_to_placeholder_text() {
        let mut payload = vec![1, 1];
        payload.extend(entry(0x36, &[1, 2, 3])); // wrong width, nonzero
        let attrs = FileAttributes::decode(&payload).unwrap();
        assert_eq!(attrs.created, "error converting date");
    }

    #[test]
    fn full_listing_shows_the_expected_lines() {
        let attrs = FileAttributes::decode(&sample_payload()).unwrap();
        let listing = attrs.full_listing();
        assert!(listing.contains("File ID:  (634,87,1)"));
        assert!(listing.contains("Owner:    [000001,000004]"));
        assert!(listing.contains("File Organization:  Sequential"));
        assert!(listing.contains("Record format:      Variable length, maximum 255 bytes"));
        assert!(listing.contains("Record attributes:  Carriage return carriage control"));
        assert!(listing.contains("Revised:   <None specified> (4)"));
    }
}
