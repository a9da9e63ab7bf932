//! The decode session and orchestration loop.
//!
//! [`run`] pulls physical blocks from a [`BlockSource`] and feeds them to a
//! [`DecodeSession`], which validates the framing and dispatches records:
//! summary records are printed, file records establish the current file
//! (and output sink), vbn records flow through the content reconstructor.
//!
//! The session owns the single open output file.  Opening the next file
//! closes the previous one; an unreconstructable record format abandons
//! the current file (deleting the partial output) without stopping the
//! run.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::block::{BlockHeader, RecordHeader, RecordType, BLOCK_HEADER_SIZE, RECORD_HEADER_SIZE};
use crate::content::{ContentReconstructor, VbnStatus};
use crate::error::Error;
use crate::file::FileAttributes;
use crate::name;
use crate::source::{BlockSource, SavesetLabels, TapeSource};
use crate::summary::SavesetSummary;

/// Default block size when neither `-b` nor a tape `HDR2` label says
/// otherwise.  This is what BACKUP writes by default.
pub const DEFAULT_BLOCK_SIZE: u32 = 32256;

/// Everything the command line decides.
#[derive(Debug, Clone)]
pub struct Options {
    /// List the saveset contents (`-t`).
    pub list: bool,
    /// Extract file contents (`-x`).
    pub extract: bool,
    /// Trace files as they are processed (`-v`).
    pub verbose: bool,
    /// Full listing detail (`-F`).
    pub full: bool,
    /// Binary passthrough: keep length prefixes, VFC control bytes and
    /// alignment padding, insert no line terminators (`-B`).
    pub binary: bool,
    /// Keep the `;version` suffix as `:version` (`-c`).
    pub keep_version: bool,
    /// Recreate the VMS directory tree (`-d`).
    pub make_dirs: bool,
    /// Extract every file type, skipping the ignored-type table (`-e`).
    pub all_types: bool,
    /// Ask before each extraction (`-w`).
    pub confirm: bool,
    /// Configured block size (`-b`).
    pub block_size: u32,
    /// Saveset number to select on a multi-saveset tape (`-s`).
    pub saveset: Option<u32>,
    /// Name filter patterns; empty selects everything.
    pub patterns: Vec<String>,
    /// Directory extracted files land in.
    pub output_dir: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            list: false,
            extract: false,
            verbose: false,
            full: false,
            binary: false,
            keep_version: false,
            make_dirs: false,
            all_types: false,
            confirm: false,
            block_size: DEFAULT_BLOCK_SIZE,
            saveset: None,
            patterns: Vec::new(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Running counters for the whole operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// File records that passed the name filter.
    pub files: u64,
    /// Sum of those files' used block counts.
    pub blocks: u64,
}

/// Lifecycle of the one output file the session may have open.
enum OutputState {
    Idle,
    Open { file: File, path: PathBuf },
    /// Content reconstruction gave up on this file; its partial output
    /// was deleted and remaining vbn records are ignored.
    Abandoned,
}

/// Per-run decode state: record dispatch, the current file, totals.
pub struct DecodeSession<'a> {
    opts: &'a Options,
    output: OutputState,
    reconstructor: Option<ContentReconstructor>,
    files: u64,
    blocks: u64,
}

impl<'a> DecodeSession<'a> {
    pub fn new(opts: &'a Options) -> Self {
        DecodeSession {
            opts,
            output: OutputState::Idle,
            reconstructor: None,
            files: 0,
            blocks: 0,
        }
    }

    pub fn totals(&self) -> Totals {
        Totals {
            files: self.files,
            blocks: self.blocks,
        }
    }

    /// Decode one physical block: validate the header, then walk and
    /// dispatch its records.
    ///
    /// A declared block size that disagrees with `negotiated` comes back
    /// as [`Error::BlockSizeMismatch`]; on the first block of a session
    /// the orchestrator turns that into a corrected restart.
    pub fn decode_block(&mut self, block: &[u8], negotiated: u32) -> Result<(), Error> {
        let header = BlockHeader::parse(block)?;
        log::debug!(
            "block {}: declared size {}, flags {:#x}",
            header.block_number,
            header.block_size,
            header.flags
        );
        if header.block_size != 0 && header.block_size != negotiated {
            return Err(Error::BlockSizeMismatch {
                declared: header.block_size,
                negotiated,
            });
        }
        // A zero declared size marks a padding block with no records.
        let bsize = (header.block_size as usize).min(block.len());

        let mut offset = BLOCK_HEADER_SIZE;
        while offset + RECORD_HEADER_SIZE <= bsize {
            let rh = RecordHeader::parse(block, offset)?;
            offset += RECORD_HEADER_SIZE;
            let remaining = bsize - offset;
            if rh.size as usize > remaining {
                return Err(Error::RecordOverrun {
                    rsize: rh.size,
                    remaining,
                });
            }
            let payload = &block[offset..offset + rh.size as usize];
            match rh.rtype {
                RecordType::Null => {}
                RecordType::Summary => self.handle_summary(payload),
                RecordType::File => self.handle_file(payload)?,
                RecordType::Vbn => self.handle_vbn(payload)?,
                RecordType::Volume
                | RecordType::Physvol
                | RecordType::Lbn
                | RecordType::Fid => {
                    log::debug!("skipping {} record ({} bytes)", rh.rtype.name(), rh.size);
                }
                RecordType::Unknown(code) => {
                    log::debug!("unrecognized record type {code} ({} bytes)", rh.size);
                }
            }
            offset += rh.size as usize;
        }
        Ok(())
    }

    fn handle_summary(&mut self, payload: &[u8]) {
        if !self.opts.list {
            return;
        }
        match SavesetSummary::decode(payload) {
            Ok(summary) => print!("{summary}"),
            Err(_) => println!("Cannot print summary; invalid data header"),
        }
    }

    /// A file record closes whatever file was open and establishes the
    /// next one: filter, list, and (when extracting) open its output.
    fn handle_file(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.close_output();
        let attrs = FileAttributes::decode(payload)?;

        let candidate = name::match_candidate(
            &attrs.filename,
            self.opts.make_dirs,
            self.opts.keep_version,
        );
        let selected = self.opts.patterns.is_empty()
            || self
                .opts
                .patterns
                .iter()
                .any(|p| name::wildcard_match(p, &candidate));
        if !selected {
            return Ok(());
        }

        if self.opts.list {
            if self.opts.full {
                print!("{}", attrs.full_listing());
            } else {
                println!("{}", attrs.brief_listing());
            }
        }
        self.files += 1;
        self.blocks += attrs.blocks();

        if self.opts.extract {
            self.open_output(&attrs)?;
        }
        Ok(())
    }

    fn open_output(&mut self, attrs: &FileAttributes) -> Result<(), Error> {
        if !self.opts.all_types && name::is_ignored_type(name::type_segment(&attrs.filename)) {
            log::debug!("skipping {} (ignored file type)", attrs.filename);
            return Ok(());
        }
        if self.opts.confirm && !confirm_extraction(&attrs.filename)? {
            return Ok(());
        }

        let relative = name::translate(
            &attrs.filename,
            self.opts.make_dirs,
            self.opts.keep_version,
        );
        let path = self.opts.output_dir.join(relative);
        if self.opts.make_dirs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        match File::create(&path) {
            Ok(file) => {
                if self.opts.verbose {
                    println!("extracting {}", attrs.filename);
                }
                self.reconstructor = Some(ContentReconstructor::new(attrs, self.opts.binary));
                self.output = OutputState::Open { file, path };
            }
            Err(e) => {
                log::warn!("cannot create {}: {e}", path.display());
            }
        }
        Ok(())
    }

    /// Feed one vbn record to the reconstructor.  No-op unless a file is
    /// open; content of unselected files is simply not decoded.
    fn handle_vbn(&mut self, payload: &[u8]) -> Result<(), Error> {
        let OutputState::Open { file, .. } = &mut self.output else {
            return Ok(());
        };
        let Some(reconstructor) = self.reconstructor.as_mut() else {
            return Ok(());
        };
        match reconstructor.process(payload, file)? {
            VbnStatus::Ok => Ok(()),
            VbnStatus::Abandon { format_byte } => {
                if let OutputState::Open { file, path } =
                    std::mem::replace(&mut self.output, OutputState::Abandoned)
                {
                    drop(file);
                    if let Err(e) = fs::remove_file(&path) {
                        log::warn!("cannot remove {}: {e}", path.display());
                    }
                }
                self.reconstructor = None;
                eprintln!("Invalid record format = {format_byte}");
                Ok(())
            }
        }
    }

    fn close_output(&mut self) {
        // Dropping the handle closes it.
        self.output = OutputState::Idle;
        self.reconstructor = None;
    }

    fn print_totals(&self) {
        println!("\nTotal of {} files, {} blocks", self.files, self.blocks);
    }

    /// End of stream: close whatever is still open.
    pub fn finish(&mut self) {
        self.close_output();
    }
}

fn confirm_extraction(filename: &str) -> Result<bool, Error> {
    print!("extract {filename} [ny]");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.starts_with('y'))
}

enum Pass {
    Complete(Totals),
    Restart(u32),
}

/// List or extract the saveset at `path` according to `opts`.
///
/// The decode loop runs at the configured block size; if the very first
/// block header declares a different size, the header is authoritative
/// and the loop restarts once from the beginning with the corrected size.
/// A second disagreement is genuine corruption and fails the run.
pub fn run(opts: &Options, path: &Path) -> Result<Totals, Error> {
    let mut source = BlockSource::open(path)?;
    if opts.extract {
        fs::create_dir_all(&opts.output_dir)?;
    }

    let mut negotiated = opts.block_size;
    let mut retried = false;
    loop {
        match run_pass(opts, &mut source, negotiated)? {
            Pass::Complete(totals) => return Ok(totals),
            Pass::Restart(declared) => {
                if retried {
                    return Err(Error::BlockSizeMismatch {
                        declared,
                        negotiated,
                    });
                }
                log::debug!("first block declares size {declared}, restarting");
                retried = true;
                negotiated = declared;
                source.rewind()?;
            }
        }
    }
}

fn run_pass(
    opts: &Options,
    source: &mut BlockSource,
    configured: u32,
) -> Result<Pass, Error> {
    let mut session = DecodeSession::new(opts);
    let mut negotiated = configured;
    let mut setnr = 0u32;
    let mut eof = false;

    // Tape mode: the labels ahead of the first saveset negotiate the
    // block size and carry the saveset number.
    if let BlockSource::Tape(tape) = source {
        match tape.read_header_labels()? {
            Some(labels) => {
                announce_labels(opts, &labels);
                if let Some(size) = labels.block_size {
                    negotiated = size;
                }
                setnr = labels.number;
            }
            None => eof = true,
        }
    }

    let mut block = vec![0u8; negotiated as usize];
    let mut first_block = true;

    while !eof {
        if opts.saveset.is_some_and(|want| want != setnr) {
            // Fails on disk, where there is no filemark to space over.
            source.skip_saveset()?;
            if let BlockSource::Tape(tape) = source {
                match next_saveset(opts, tape, &session)? {
                    Some(labels) => {
                        if let Some(size) = labels.block_size {
                            negotiated = size;
                            block.resize(negotiated as usize, 0);
                        }
                        setnr = labels.number;
                    }
                    None => eof = true,
                }
            }
            continue;
        }

        let n = source.read_block(&mut block)?;
        if n == 0 {
            match source {
                // Disk savesets hold exactly one saveset.
                BlockSource::Disk(_) => eof = true,
                BlockSource::Tape(tape) => match next_saveset(opts, tape, &session)? {
                    Some(labels) => {
                        if let Some(size) = labels.block_size {
                            negotiated = size;
                            block.resize(negotiated as usize, 0);
                        }
                        setnr = labels.number;
                    }
                    None => eof = true,
                },
            }
            continue;
        }
        if n != block.len() {
            return Err(Error::ShortRead {
                got: n,
                expected: block.len(),
            });
        }

        match session.decode_block(&block, negotiated) {
            Err(Error::BlockSizeMismatch { declared, .. }) if first_block && declared != 0 => {
                return Ok(Pass::Restart(declared));
            }
            other => other?,
        }
        first_block = false;
    }

    session.finish();
    if opts.verbose || opts.list {
        if source.is_tape() {
            println!("End of tape");
        } else {
            session.print_totals();
            println!("End of save set");
        }
    }
    Ok(Pass::Complete(session.totals()))
}

/// Between savesets on tape: print the running totals, consume the
/// trailer labels, then scan the next saveset's header labels.  `None`
/// means the tape is exhausted.
fn next_saveset(
    opts: &Options,
    tape: &mut TapeSource,
    session: &DecodeSession,
) -> Result<Option<SavesetLabels>, Error> {
    if opts.verbose || opts.list {
        session.print_totals();
    }
    if let Some(name) = tape.read_trailer_labels()? {
        if opts.verbose || opts.list {
            println!("End of saveset: {name}\n\n");
        }
    }
    let labels = tape.read_header_labels()?;
    if let Some(ref l) = labels {
        announce_labels(opts, l);
    }
    Ok(labels)
}

fn announce_labels(opts: &Options, labels: &SavesetLabels) {
    if !(opts.verbose || opts.list) {
        return;
    }
    if let Some(volume) = &labels.volume {
        println!("Volume: {volume}");
    }
    println!(
        "Saveset name: {}   number: {}",
        labels.name, labels.number
    );
}
