//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Whatever the source, the result is a [`RunConfig`] that is validated once
//! and then treated as immutable by the core.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;
pub mod workload;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use workload::*;

/// Default size used when a file is created or stats as empty (typical MongoDB)
pub const DEFAULT_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Default duration for canned kernels when none is given
pub const DEFAULT_KERNEL_SECONDS: u64 = 10;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub workload: WorkloadConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Access pattern and thread configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadConfig {
    /// MAP_SHARED or MAP_PRIVATE
    #[serde(default)]
    pub visibility: Visibility,
    /// Read and/or write on each step
    #[serde(default)]
    pub access: AccessMask,
    /// Bytes between accesses; negative walks downward
    #[serde(default = "default_stride")]
    pub stride: i64,
    /// Initial byte offset of forward walks
    #[serde(default)]
    pub offset: u64,
    /// Start one file-size beyond the mapping (deliberate SIGBUS)
    #[serde(default)]
    pub overcommit: bool,
    /// Count loops per full pass instead of per access
    #[serde(default)]
    pub walking: bool,
    /// Random 16-byte aligned addresses across the whole file
    #[serde(default)]
    pub jump_around: bool,
    /// Loop count or duration
    #[serde(default)]
    pub termination: Termination,
    /// Flushes applied after each general-mode access, in order
    #[serde(default)]
    pub sync_ops: Vec<SyncOp>,
    /// Canned kernel id, 0 for the general engine
    #[serde(default)]
    pub hiperf: u32,
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Skip the one-second delay between traced steps
    #[serde(default)]
    pub no_sleep: bool,
    /// Placement of workers on logical CPUs
    #[serde(default)]
    pub placement: CpuPlacement,
    /// Unmap extent at release
    #[serde(default)]
    pub unmap: UnmapPolicy,
}

fn default_stride() -> i64 {
    4
}

fn default_threads() -> usize {
    1
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            visibility: Visibility::Shared,
            access: AccessMask::default(),
            stride: default_stride(),
            offset: 0,
            overcommit: false,
            walking: false,
            jump_around: false,
            termination: Termination::default(),
            sync_ops: Vec::new(),
            hiperf: 0,
            threads: default_threads(),
            no_sleep: false,
            placement: CpuPlacement::Linear,
            unmap: UnmapPolicy::Full,
        }
    }
}

impl WorkloadConfig {
    /// Selected canned kernel, if any
    pub fn kernel(&self) -> Option<Kernel> {
        Kernel::from_id(self.hiperf)
    }
}

/// Target file configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// Path of the backing file
    pub path: PathBuf,
    /// Create the file this way (refuses to clobber unless `delete_first`)
    #[serde(default)]
    pub create: Option<CreateMode>,
    /// Unlink the file before creating it
    #[serde(default)]
    pub delete_first: bool,
    /// close(2) and reopen after creation
    #[serde(default)]
    pub close_after_create: bool,
    /// read(2) one word through the descriptor before mapping
    #[serde(default)]
    pub read_first: bool,
    /// Size for (f)truncate creation, and for empty special files
    #[serde(default = "default_file_size")]
    pub size: u64,
}

fn default_file_size() -> u64 {
    DEFAULT_FILE_SIZE
}

impl TargetConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: None,
            delete_first: false,
            close_after_create: false,
            read_first: false,
            size: DEFAULT_FILE_SIZE,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OutputConfig {
    /// Per-step tracing behaviour
    #[serde(default)]
    pub trace: TraceMode,
    /// Diagnostic verbosity (0 = warnings only)
    #[serde(default)]
    pub verbose: u8,
    /// Write a JSON summary here
    #[serde(default)]
    pub json: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(workload: WorkloadConfig, target: TargetConfig) -> Self {
        Self {
            workload,
            target,
            output: OutputConfig::default(),
        }
    }

    /// Apply the settings a canned kernel implies
    ///
    /// Kernels run shared, quietly, with both access bits, and default to a
    /// ten second duration. Walk kernels report at cache-line stride.
    pub fn apply_kernel_defaults(&mut self) {
        let Some(kernel) = self.workload.kernel() else {
            return;
        };
        self.output.trace = TraceMode::Quiet;
        self.workload.visibility = Visibility::Shared;
        self.workload.access = AccessMask::BOTH;
        if !self.workload.termination.is_duration() {
            self.workload.termination = Termination::Seconds(DEFAULT_KERNEL_SECONDS);
        }
        if kernel.is_walk() {
            self.workload.stride = CACHE_LINE as i64;
        }
    }
}
