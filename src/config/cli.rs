//! CLI argument parsing using clap
//!
//! The short options keep the single-letter vocabulary long-time users of
//! the tool type from memory. `-h` selects a kernel, so help is `--help`.

use super::workload::SyncOp;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;

/// maptrap - mmap() exerciser with looping, increments, single-stepping and more
#[derive(Parser, Debug, Default)]
#[command(name = "maptrap")]
#[command(version, about, long_about = None, disable_help_flag = true)]
pub struct Cli {
    /// Backing file to map
    #[arg(value_name = "FILE")]
    pub target: Option<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,

    // === Mapping ===
    /// MAP_SHARED (default)
    #[arg(short = 'S', long, conflicts_with = "private")]
    pub shared: bool,

    /// MAP_PRIVATE
    #[arg(short = 'P', long)]
    pub private: bool,

    /// Read memory accesses
    #[arg(short = 'R', long)]
    pub read: bool,

    /// Write memory accesses
    #[arg(short = 'W', long)]
    pub write: bool,

    // === File preparation ===
    /// Create the file: 1 write(2), 2 ftruncate(2), 3 truncate(2)
    #[arg(short = 'c', long, value_name = "MODE")]
    pub create: Option<u32>,

    /// close(2) and reopen the file after creation
    #[arg(short = 'C', long)]
    pub close_after_create: bool,

    /// Delete the file before creating it
    #[arg(short = 'd', long)]
    pub delete: bool,

    /// read(2) the file first
    #[arg(short = 'r', long)]
    pub read_first: bool,

    /// Size of the file for (f)truncate (default 16M)
    #[arg(short = 't', long, value_name = "SIZE")]
    pub size: Option<String>,

    // === Flushes (applied in command-line order) ===
    /// fsync() after update
    #[arg(short = 'f', long, action = ArgAction::Count)]
    pub fsync: u8,

    /// fdatasync() after update
    #[arg(short = 'F', long, action = ArgAction::Count)]
    pub fdatasync: u8,

    /// msync() after update
    #[arg(short = 'm', long, action = ArgAction::Count)]
    pub msync: u8,

    /// Flush order as given on the command line (filled in by `parse_args`)
    #[arg(skip)]
    pub sync_sequence: Vec<SyncOp>,

    // === Access pattern ===
    /// High-performance kernel 1-9
    #[arg(short = 'h', long, value_name = "N")]
    pub hiperf: Option<u32>,

    /// Jump around (random access across entire file)
    #[arg(short = 'j', long)]
    pub jump_around: bool,

    /// Loop n times (default 1)
    #[arg(short = 'l', long, value_name = "N")]
    pub loops: Option<String>,

    /// Loop for n seconds
    #[arg(short = 'L', long, value_name = "SECONDS")]
    pub seconds: Option<String>,

    /// Initial offset (bytes)
    #[arg(short = 'o', long, value_name = "BYTES")]
    pub offset: Option<String>,

    /// Overcommit memory (accesses start beyond EOF)
    #[arg(short = 'O', long)]
    pub overcommit: bool,

    /// Stride (in bytes) for each loop iteration, negative walks down
    #[arg(short = 's', long, value_name = "BYTES", allow_hyphen_values = true)]
    pub stride: Option<String>,

    /// Walk the entire space with this stride, obey -l|-L
    #[arg(short = 'w', long, value_name = "BYTES", allow_hyphen_values = true)]
    pub walk: Option<String>,

    // === Threads ===
    /// Number of threads: N, ALL (every logical CPU) or CORES (one per core)
    #[arg(short = 'T', long, value_name = "N|ALL|CORES")]
    pub threads: Option<String>,

    /// Place threads core-major (one hardware thread per core first)
    #[arg(long, conflicts_with = "cpu_list")]
    pub core_major: bool,

    /// Explicit CPU list for worker placement (e.g. "0,2-4")
    #[arg(long, value_name = "LIST")]
    pub cpu_list: Option<String>,

    // === Tracing ===
    /// Pause/prompt for each step
    #[arg(short = 'p', long, conflicts_with = "quiet")]
    pub prompt: bool,

    /// No output, suppress 1-second loop delay
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase verbosity (might hurt performance)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress inter-step sleep
    #[arg(short = 'Z', long)]
    pub no_sleep: bool,

    // === Teardown ===
    /// Suppress final munmap()
    #[arg(short = 'u', long, conflicts_with = "legacy_unmap")]
    pub no_unmap: bool,

    /// Unmap only the first page at exit
    #[arg(long)]
    pub legacy_unmap: bool,

    // === Configuration and output ===
    /// Load the run configuration from a TOML file (flags override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a JSON summary to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments, recording the order of the flush flags
    pub fn parse_args() -> Self {
        let matches = Self::command().get_matches();
        match Self::from_matches_ordered(&matches) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        }
    }

    /// Parse from an explicit argument list (first item is the program name)
    pub fn try_parse_ordered<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        Self::from_matches_ordered(&matches)
    }

    fn from_matches_ordered(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut cli = Self::from_arg_matches(matches)?;
        cli.sync_sequence = sync_sequence(matches);
        Ok(cli)
    }
}

/// Interleave the flush flags by their position on the command line
fn sync_sequence(matches: &ArgMatches) -> Vec<SyncOp> {
    let mut ordered: Vec<(usize, SyncOp)> = Vec::new();
    for (id, op) in [
        ("fsync", SyncOp::Fsync),
        ("fdatasync", SyncOp::Fdatasync),
        ("msync", SyncOp::Msync),
    ] {
        if let Some(indices) = matches.indices_of(id) {
            ordered.extend(indices.map(|i| (i, op)));
        }
    }
    ordered.sort_unstable_by_key(|(i, _)| *i);
    ordered.into_iter().map(|(_, op)| op).collect()
}
