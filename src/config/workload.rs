//! Workload vocabulary types
//!
//! Small enums and value types shared by the CLI layer, the TOML loader, the
//! validator and the engine.

use crate::error::MaptrapError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the window the canned kernels operate in (first 2 GiB of the file)
pub const KERNEL_WINDOW: u64 = 1 << 31;

/// Per-thread slice of the kernel window (32 slices of 64 MiB)
pub const KERNEL_SLICE: u64 = 64 * 1024 * 1024;

/// Most threads a windowed walk kernel can partition the window into
pub const KERNEL_MAX_THREADS: usize = (KERNEL_WINDOW / KERNEL_SLICE) as usize;

/// Cache line size assumed by the kernels and the traffic estimate
pub const CACHE_LINE: u64 = 64;

/// Most flush operations that may be queued after each access
pub const MAX_SYNC_OPS: usize = 9;

/// Mapping visibility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// MAP_SHARED: stores reach the page cache and the file
    #[default]
    Shared,
    /// MAP_PRIVATE: stores are copy-on-write
    Private,
}

impl Visibility {
    /// mmap(2) flag for this visibility
    pub fn mmap_flag(self) -> libc::c_int {
        match self {
            Self::Shared => libc::MAP_SHARED,
            Self::Private => libc::MAP_PRIVATE,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "MAP_SHARED"),
            Self::Private => write!(f, "MAP_PRIVATE"),
        }
    }
}

/// Which memory operations each general-mode step performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AccessMask {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

impl AccessMask {
    pub const READ: Self = Self { read: true, write: false };
    pub const WRITE: Self = Self { read: false, write: true };
    pub const BOTH: Self = Self { read: true, write: true };

    pub fn is_empty(self) -> bool {
        !self.read && !self.write
    }
}

impl fmt::Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.read, self.write) {
            (true, true) => write!(f, "read+write"),
            (true, false) => write!(f, "read"),
            (false, true) => write!(f, "write"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// How a run ends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// Run a fixed number of loop units per thread
    Loops(u64),
    /// Run until the stop flag is raised after this many seconds
    Seconds(u64),
}

impl Termination {
    /// Combine the two mutually exclusive CLI knobs
    ///
    /// Zero means "not given" for both. A missing or zero loop count
    /// becomes a single loop.
    pub fn from_parts(loops: Option<u64>, seconds: Option<u64>) -> Result<Self, MaptrapError> {
        let loops = loops.filter(|&n| n > 0);
        let seconds = seconds.filter(|&n| n > 0);
        match (loops, seconds) {
            (Some(_), Some(_)) => Err(MaptrapError::config("only one of loop count or duration")),
            (_, Some(s)) => Ok(Self::Seconds(s)),
            (Some(n), None) => Ok(Self::Loops(n)),
            (None, None) => Ok(Self::Loops(1)),
        }
    }

    pub fn seconds(self) -> Option<u64> {
        match self {
            Self::Seconds(s) => Some(s),
            Self::Loops(_) => None,
        }
    }

    pub fn is_duration(self) -> bool {
        matches!(self, Self::Seconds(_))
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::Loops(1)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loops(n) => write!(f, "{} loop(s)", n),
            Self::Seconds(s) => write!(f, "{} second(s)", s),
        }
    }
}

/// A flush applied after each general-mode access
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    /// fsync(2) on the whole file
    Fsync,
    /// fdatasync(2), data only
    Fdatasync,
    /// msync(2) of the page just touched
    Msync,
}

impl SyncOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Fsync => "fsync",
            Self::Fdatasync => "fdatasync",
            Self::Msync => "msync",
        }
    }
}

/// Traversal extent of a walking kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Whole 2 GiB window, shared by every thread
    Full,
    /// Each thread stays inside its own 64 MiB slice
    Chunked,
}

/// Canned high-performance kernels, selected by id 1-9
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// 1: read a private cache line over and over
    FixedCachelineRead,
    /// 2/3: cache-line walk, load
    WalkRead(Window),
    /// 4/5: cache-line walk, store
    WalkWrite(Window),
    /// 6/7: cache-line walk, load then store back
    WalkReadWrite(Window),
    /// 8: random aligned load
    RandomRead,
    /// 9: random aligned load, increment, store
    RandomIncrement,
}

impl Kernel {
    /// Decode a kernel id; 0 and anything above 9 select no kernel
    pub fn from_id(id: u32) -> Option<Self> {
        use Window::*;
        Some(match id {
            1 => Self::FixedCachelineRead,
            2 => Self::WalkRead(Full),
            3 => Self::WalkRead(Chunked),
            4 => Self::WalkWrite(Full),
            5 => Self::WalkWrite(Chunked),
            6 => Self::WalkReadWrite(Full),
            7 => Self::WalkReadWrite(Chunked),
            8 => Self::RandomRead,
            9 => Self::RandomIncrement,
            _ => return None,
        })
    }

    pub fn id(self) -> u32 {
        use Window::*;
        match self {
            Self::FixedCachelineRead => 1,
            Self::WalkRead(Full) => 2,
            Self::WalkRead(Chunked) => 3,
            Self::WalkWrite(Full) => 4,
            Self::WalkWrite(Chunked) => 5,
            Self::WalkReadWrite(Full) => 6,
            Self::WalkReadWrite(Chunked) => 7,
            Self::RandomRead => 8,
            Self::RandomIncrement => 9,
        }
    }

    /// Kernels that walk the window at cache-line stride
    pub fn is_walk(self) -> bool {
        matches!(self, Self::WalkRead(_) | Self::WalkWrite(_) | Self::WalkReadWrite(_))
    }

    /// Kernels that touch the 2 GiB window and therefore need a 2 GiB file
    pub fn needs_window(self) -> bool {
        !matches!(self, Self::FixedCachelineRead)
    }

    pub fn description(self) -> &'static str {
        use Window::*;
        match self {
            Self::FixedCachelineRead => "fixed reads from per-thread cache line",
            Self::WalkRead(Full) => "cacheline walk load in 1st 2G (full)",
            Self::WalkRead(Chunked) => "cacheline walk load in 1st 2G (chunk)",
            Self::WalkWrite(Full) => "cacheline walk store to 1st 2G (full)",
            Self::WalkWrite(Chunked) => "cacheline walk store to 1st 2G (chunk)",
            Self::WalkReadWrite(Full) => "cacheline walk LD-ST in 1st 2G (full)",
            Self::WalkReadWrite(Chunked) => "cacheline walk LD-ST in 1st 2G (chunk)",
            Self::RandomRead => "random LD in 1st 2G",
            Self::RandomIncrement => "random LD-incr-ST in 1st 2G",
        }
    }
}

/// How worker threads are placed on logical CPUs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CpuPlacement {
    /// Thread i runs on logical CPU i
    #[default]
    Linear,
    /// Fill one hardware thread of every core before using siblings
    CoreMajor,
    /// Thread i runs on the i-th CPU of an explicit list
    List(Vec<usize>),
}

/// How much of the mapping is released at the end of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UnmapPolicy {
    /// munmap the whole mapped extent
    #[default]
    Full,
    /// munmap only the first page, as older builds of the tool did
    LegacyPage,
    /// leave the mapping in place
    Skip,
}

/// How the target file is created when it does not exist yet
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreateMode {
    /// open(O_CREAT) and write(2) a short marker string
    Write,
    /// open(O_CREAT) then ftruncate(2) to size
    Ftruncate,
    /// open(O_CREAT), close, then truncate(2) by path
    Truncate,
}

impl CreateMode {
    /// Decode the numeric CLI selector (1 write, 2 ftruncate, 3 truncate)
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Write),
            2 => Some(Self::Ftruncate),
            3 => Some(Self::Truncate),
            _ => None,
        }
    }
}

/// Tracing and single-step behaviour of the general loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// Print each step, pausing one second between steps
    #[default]
    Verbose,
    /// Prompt and wait for Enter before each step
    Step,
    /// No per-step output and no inter-step delay
    Quiet,
}
