//! Saveset summary records.
//!
//! The first record of a saveset describes the saveset itself: who wrote
//! it, when, on which node and OS, and the block geometry.  The summary is
//! decoded, printed, and forgotten; nothing in it feeds later decoding.

use std::fmt;

use crate::bytes::{u16_at, u32_at};
use crate::error::Error;
use crate::hexdump;
use crate::tlv::TlvScanner;
use crate::vmstime;

/// Decoded saveset-level attributes, with the documented defaults for any
/// field the record does not carry.
#[derive(Debug, Clone)]
pub struct SavesetSummary {
    pub saveset: String,
    pub command: String,
    pub written_by: String,
    pub uic_group: u16,
    pub uic_user: u16,
    pub date: String,
    pub os: String,
    pub os_version: String,
    pub node_name: String,
    pub cpu_id: u32,
    pub written_on: String,
    pub backup_version: String,
    pub block_size: u32,
    pub group_size: u16,
    pub buffer_count: u16,
}

impl Default for SavesetSummary {
    fn default() -> Self {
        SavesetSummary {
            saveset: String::new(),
            command: String::new(),
            written_by: String::new(),
            uic_group: 0o377,
            uic_user: 0o377,
            date: "<unknown date>".to_string(),
            os: "<unknown OS>".to_string(),
            os_version: "unknown".to_string(),
            node_name: String::new(),
            cpu_id: 0,
            written_on: String::new(),
            backup_version: "unknown".to_string(),
            block_size: 0,
            group_size: 0,
            buffer_count: 0,
        }
    }
}

fn os_name(code: u16) -> Option<&'static str> {
    match code {
        0x800 => Some("OpenVMS AXP"),
        0x400 => Some("OpenVMS VAX"),
        0x004 => Some("RSTS/E"),
        _ => None,
    }
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

impl SavesetSummary {
    /// Decode one summary record payload.
    ///
    /// Unknown attribute types are skipped for future expansion.  Fails
    /// only on a bad data-header marker, which the caller treats as a
    /// skipped summary rather than a fatal condition.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut summary = SavesetSummary::default();
        for attr in TlvScanner::new(payload)? {
            log::debug!(
                "summary attribute type {:#x}, {} bytes\n{}",
                attr.atype,
                attr.value.len(),
                hexdump::dump(attr.value)
            );
            match attr.atype {
                1 => summary.saveset = text(attr.value),
                2 => summary.command = text(attr.value),
                4 => summary.written_by = text(attr.value),
                5 => {
                    if attr.value.len() == 4 {
                        summary.uic_user = u16_at(attr.value, 0)?;
                        summary.uic_group = u16_at(attr.value, 2)?;
                    }
                }
                6 => {
                    summary.date = vmstime::format_vms_time(attr.value)
                        .unwrap_or_else(|| "error converting date".to_string());
                }
                7 => {
                    if attr.value.len() == 2 {
                        if let Some(name) = os_name(u16_at(attr.value, 0)?) {
                            summary.os = name.to_string();
                        }
                    }
                }
                8 => summary.os_version = text(attr.value),
                9 => summary.node_name = text(attr.value),
                10 => {
                    if attr.value.len() >= 4 {
                        summary.cpu_id = u32_at(attr.value, 0)?;
                    }
                }
                11 => summary.written_on = text(attr.value),
                12 => summary.backup_version = text(attr.value),
                13 => {
                    if attr.value.len() >= 4 {
                        summary.block_size = u32_at(attr.value, 0)?;
                    }
                }
                14 => {
                    if attr.value.len() >= 2 {
                        summary.group_size = u16_at(attr.value, 0)?;
                    }
                }
                15 => {
                    if attr.value.len() >= 2 {
                        summary.buffer_count = u16_at(attr.value, 0)?;
                    }
                }
                _ => {}
            }
        }
        Ok(summary)
    }
}

impl fmt::Display for SavesetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Save set:          {}", self.saveset)?;
        writeln!(f, "Written by:        {}", self.written_by)?;
        writeln!(
            f,
            "UIC:               [{:06o},{:06o}]",
            self.uic_group, self.uic_user
        )?;
        writeln!(f, "Date:              {}", self.date)?;
        writeln!(f, "Command:           {}", self.command)?;
        writeln!(
            f,
            "Operating system:  {} version {}",
            self.os, self.os_version
        )?;
        writeln!(f, "BACKUP version:    {}", self.backup_version)?;
        writeln!(f, "CPU ID register:   {:08x}", self.cpu_id)?;
        writeln!(f, "Node name:         {}", self.node_name)?;
        writeln!(f, "Written on:        {}", self.written_on)?;
        writeln!(f, "Block size:        {}", self.block_size)?;
        if self.group_size != 0 {
            writeln!(f, "Group size:        {}", self.group_size)?;
        }
        // Trailing blank line separates the summary from the file listing.
        writeln!(f, "Buffer count:      {}", self.buffer_count)?;
        writeln!(f)
    }
}
