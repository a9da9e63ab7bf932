use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vmsbackup::session::{self, Options, DEFAULT_BLOCK_SIZE};

#[derive(Parser)]
#[command(
    name = "vmsbackup",
    about = "Read and extract files from a VMS BACKUP saveset",
    disable_version_flag = true
)]
struct Cli {
    /// Block size to read the saveset with
    #[arg(short = 'b', value_name = "BLOCKSIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Keep the file version number, as name:version
    #[arg(short = 'c')]
    keep_version: bool,

    /// Recreate the original directory structure
    #[arg(short = 'd')]
    make_dirs: bool,

    /// Extract all file types, including those normally ignored
    #[arg(short = 'e')]
    all_types: bool,

    /// Tape device or disk saveset to read
    #[arg(short = 'f', value_name = "FILE", default_value = "/dev/rmt8")]
    input: PathBuf,

    /// Process only this saveset number on a multi-saveset tape
    #[arg(short = 's', value_name = "SAVESET")]
    saveset: Option<u32>,

    /// List the saveset directory
    #[arg(short = 't')]
    list: bool,

    /// Report each file as it is processed
    #[arg(short = 'v')]
    verbose: bool,

    /// Ask for confirmation before extracting each file
    #[arg(short = 'w')]
    confirm: bool,

    /// Extract files from the saveset
    #[arg(short = 'x')]
    extract: bool,

    /// Full directory listing detail
    #[arg(short = 'F')]
    full: bool,

    /// Print the program version and exit
    #[arg(short = 'V')]
    version: bool,

    /// Binary extraction: keep record prefixes and padding verbatim
    #[arg(short = 'B')]
    binary: bool,

    /// Enable debug tracing of records and attributes
    #[arg(short = 'D')]
    debug: bool,

    /// File name patterns to select (* and ? wildcards)
    #[arg(value_name = "PATTERN")]
    patterns: Vec<String>,
}

fn usage() {
    eprintln!(
        "Usage:  vmsbackup -{{tx}}[cdevwBDF][-b blocksize][-s setnumber][-f tapefile][name...]"
    );
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("VMSBACKUP version {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::FAILURE;
    }

    let mut builder = env_logger::Builder::from_default_env();
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    // Exactly one of list or extract drives the run.
    if cli.list == cli.extract {
        usage();
        return ExitCode::FAILURE;
    }

    let opts = Options {
        list: cli.list,
        extract: cli.extract,
        verbose: cli.verbose,
        full: cli.full,
        binary: cli.binary,
        keep_version: cli.keep_version,
        make_dirs: cli.make_dirs,
        all_types: cli.all_types,
        confirm: cli.confirm,
        block_size: cli.block_size,
        saveset: cli.saveset,
        patterns: cli.patterns,
        output_dir: PathBuf::from("."),
    };

    match session::run(&opts, &cli.input) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vmsbackup: {e}");
            ExitCode::FAILURE
        }
    }
}
