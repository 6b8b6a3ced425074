//! Access engine abstraction
//!
//! An access engine is the loop a worker runs against the mapped region once
//! the start barrier has been passed. Two families exist:
//!
//! - **General** ([`pattern::GeneralEngine`]): linear forward, linear reverse
//!   or jump-around traversal with optional flushes, tracing and a loop or
//!   duration budget.
//! - **Kernels** ([`kernels::KernelEngine`]): nine tight loops over the first
//!   2 GiB of the file, bounded only by the stop flag.
//!
//! Each worker owns one engine, picked once by [`create_engine`].
//!
//! # Example
//!
//! ```no_run
//! use maptrap::config::WorkloadConfig;
//! use maptrap::engine::create_engine;
//!
//! let workload = WorkloadConfig { hiperf: 8, ..Default::default() };
//! let engine = create_engine(&workload, 3);
//! assert_eq!(engine.name(), "kernel");
//! ```

pub mod kernels;
pub mod pattern;
pub mod region;
pub mod sync;

use crate::config::WorkloadConfig;
use crate::coordinator::state::SharedRunState;
use crate::util::trace::Tracer;
use crate::worker::ThreadContext;
use crate::Result;
use region::MappedRegion;
use std::os::unix::io::RawFd;

/// Everything an engine borrows from the run for the duration of its loop
pub struct RunContext<'a> {
    /// The one mapping every worker shares
    pub region: &'a MappedRegion,
    /// Stop flag, start timestamp and jump-around generator
    pub state: &'a SharedRunState,
    /// Per-step output and pause policy
    pub tracer: Tracer,
    /// True on the single worker allowed to print and prompt
    pub coordinator: bool,
}

/// Access engine trait
///
/// Engines must be `Send` so a worker can build one on the spawning thread
/// and move it into the worker thread. Each worker thread owns its own
/// engine instance.
pub trait AccessEngine: Send {
    /// Short engine family name, for logs
    fn name(&self) -> &'static str;

    /// Run the access loop until its budget is spent or a stop is requested
    ///
    /// Every counted access is added to `thread.accesses`.
    ///
    /// # Errors
    ///
    /// Returns [`MaptrapError::BoundsViolation`](crate::MaptrapError::BoundsViolation)
    /// if the configured start lies beyond EOF without overcommit. Flush
    /// failures are logged and never returned.
    fn run(&mut self, ctx: &RunContext<'_>, thread: &mut ThreadContext) -> Result<()>;
}

/// Pick the engine for a workload
///
/// A kernel id selects the kernel engine; otherwise the general engine is
/// built with the workload's flush list bound to `fd`.
pub fn create_engine(workload: &WorkloadConfig, fd: RawFd) -> Box<dyn AccessEngine> {
    match workload.kernel() {
        Some(kernel) => Box::new(kernels::KernelEngine::new(kernel)),
        None => {
            let sync = sync::SyncPolicy::new(workload.sync_ops.clone(), fd);
            Box::new(pattern::GeneralEngine::new(workload, sync))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workload::{AccessMask, SyncOp};

    #[test]
    fn test_create_engine_general() {
        let workload = WorkloadConfig {
            access: AccessMask::READ,
            sync_ops: vec![SyncOp::Msync],
            ..Default::default()
        };
        assert_eq!(create_engine(&workload, -1).name(), "general");
    }

    #[test]
    fn test_create_engine_kernel() {
        for id in 1..=9 {
            let workload = WorkloadConfig {
                hiperf: id,
                ..Default::default()
            };
            assert_eq!(create_engine(&workload, -1).name(), "kernel");
        }
    }
}
