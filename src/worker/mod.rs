//! Worker thread implementation
//!
//! A worker pins itself to its CPU, meets the other participants at the start
//! barrier, then runs its access engine until the budget is spent or the stop
//! flag is raised. Its only output is the access count in its
//! [`ThreadContext`].
//!
//! # Example
//!
//! ```no_run
//! use maptrap::config::{RunConfig, TargetConfig, WorkloadConfig};
//! use maptrap::config::workload::{AccessMask, Visibility};
//! use maptrap::coordinator::state::SharedRunState;
//! use maptrap::engine::region::MappedRegion;
//! use maptrap::worker::Worker;
//! use std::os::unix::io::AsRawFd;
//! use std::sync::Arc;
//!
//! let file = std::fs::OpenOptions::new().read(true).write(true).open("/tmp/maptrap.dat")?;
//! let region = Arc::new(MappedRegion::establish(file.as_raw_fd(), 4096, Visibility::Shared)?);
//! let config = RunConfig::new(
//!     WorkloadConfig { access: AccessMask::READ, ..Default::default() },
//!     TargetConfig::new("/tmp/maptrap.dat"),
//! );
//! let state = Arc::new(SharedRunState::new(1));
//! let worker = Worker::new(0, 0, &config, file.as_raw_fd(), region, state);
//! let thread = worker.run()?;
//! println!("{} accesses", thread.accesses);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod affinity;

use crate::config::RunConfig;
use crate::coordinator::state::SharedRunState;
use crate::engine::region::MappedRegion;
use crate::engine::{create_engine, AccessEngine, RunContext};
use crate::error::MaptrapError;
use crate::util::time::unix_seconds;
use crate::util::trace::Tracer;
use crate::Result;
use std::os::unix::io::RawFd;
use std::sync::Arc;

/// Per-thread identity and counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    /// Spawn index, 0-based
    pub index: usize,
    /// Logical CPU the thread is pinned to
    pub cpu: usize,
    /// Counted memory accesses
    pub accesses: u64,
    /// Seed of the thread-private generator used by the random kernels
    pub seed: u64,
}

impl ThreadContext {
    pub fn new(index: usize, cpu: usize) -> Self {
        Self {
            index,
            cpu,
            accesses: 0,
            seed: index as u64 * 1000 + unix_seconds(),
        }
    }
}

/// One worker thread's state, built on the spawning thread and moved in
pub struct Worker {
    context: ThreadContext,
    engine: Box<dyn AccessEngine>,
    region: Arc<MappedRegion>,
    state: Arc<SharedRunState>,
    tracer: Tracer,
}

impl Worker {
    pub fn new(
        index: usize,
        cpu: usize,
        config: &RunConfig,
        fd: RawFd,
        region: Arc<MappedRegion>,
        state: Arc<SharedRunState>,
    ) -> Self {
        Self {
            context: ThreadContext::new(index, cpu),
            engine: create_engine(&config.workload, fd),
            region,
            state,
            tracer: Tracer::new(config.output.trace, config.workload.no_sleep),
        }
    }

    pub fn index(&self) -> usize {
        self.context.index
    }

    /// Pin, rendezvous, run the engine
    ///
    /// Every failure raises the stop flag so peers end promptly. A failed
    /// pin still arrives at the barrier before reporting. A stop raised
    /// before the run started returns the untouched context.
    pub fn run(mut self) -> Result<ThreadContext> {
        let index = self.context.index;
        let cpu = self.context.cpu;

        let pinned = affinity::pin_current_thread(cpu);
        let coordinator = self.state.rendezvous();

        if let Err(err) = pinned {
            self.state.request_stop();
            return Err(MaptrapError::resource(format!(
                "thread {}: cannot pin to CPU {}: {:#}",
                index, cpu, err
            ))
            .into());
        }

        let Some(coordinator) = coordinator else {
            log::debug!("thread {}: run stopped before start", index);
            return Ok(self.context);
        };
        if coordinator {
            log::debug!("thread {} on CPU {} is the coordinator", index, cpu);
        }
        log::trace!("thread {} running {} engine on CPU {}", index, self.engine.name(), cpu);

        let ctx = RunContext {
            region: &self.region,
            state: &self.state,
            tracer: self.tracer,
            coordinator,
        };
        if let Err(err) = self.engine.run(&ctx, &mut self.context) {
            self.state.request_stop();
            return Err(err);
        }

        Ok(self.context)
    }
}
