//! Run coordination
//!
//! Spawns one pinned worker per configured thread, starts them together
//! through the barrier in [`state::SharedRunState`], ends duration runs by
//! raising the stop flag, and joins everything into a [`RunOutcome`].
//!
//! The main thread joins the barrier only when tracing is quiet. With tracing
//! on it stays out, so the coordinator role (the one thread allowed to print
//! and prompt) always lands on a worker.

pub mod state;

use crate::config::workload::TraceMode;
use crate::config::RunConfig;
use crate::engine::region::MappedRegion;
use crate::error::MaptrapError;
use crate::util::time::Timestamp;
use crate::util::topology::CpuTopology;
use crate::worker::{affinity, ThreadContext, Worker};
use crate::Result;
use anyhow::Context;
use state::SharedRunState;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Everything the statistics need from a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One entry per worker, in spawn order
    pub threads: Vec<ThreadContext>,
    /// Set by the coordinator as it left the barrier
    pub started: Timestamp,
    /// Taken by the main thread after the last join
    pub stopped: Timestamp,
}

impl RunOutcome {
    pub fn elapsed(&self) -> Duration {
        self.stopped.duration_since(self.started)
    }
}

/// Owns the spawn, wait and join phases of one run
pub struct Coordinator<'a> {
    config: &'a RunConfig,
    topology: CpuTopology,
}

impl<'a> Coordinator<'a> {
    pub fn new(config: &'a RunConfig, topology: CpuTopology) -> Self {
        Self { config, topology }
    }

    /// True when the main thread takes part in the start barrier
    pub fn main_participates(&self) -> bool {
        self.config.output.trace == TraceMode::Quiet
    }

    /// Run every worker against `region` and collect their counters
    ///
    /// # Errors
    ///
    /// A thread that cannot be spawned is a resource error; the stop flag
    /// releases the workers already waiting at the barrier and they are
    /// joined first. Otherwise every worker is joined and the first failure
    /// in spawn order is returned, a panic counting as a resource error.
    pub fn run(&self, region: Arc<MappedRegion>, fd: RawFd) -> Result<RunOutcome> {
        let workload = &self.config.workload;
        let threads = workload.threads.max(1);
        let main_participates = self.main_participates();
        let state = Arc::new(SharedRunState::new(threads + main_participates as usize));

        log::info!(
            "{} {}, {} thread(s), {}",
            workload.visibility,
            workload.kernel().map_or("general", |k| k.description()),
            threads,
            workload.termination
        );

        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let cpu = affinity::cpu_for_thread(&workload.placement, &self.topology, index);
            let worker = Worker::new(index, cpu, self.config, fd, region.clone(), state.clone());
            log::debug!("spawning thread {} for CPU {}", index, cpu);

            let spawned = thread::Builder::new()
                .name(format!("maptrap-{}", index))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // releases the spawned workers from the barrier
                    state.request_stop();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(MaptrapError::resource(format!("cannot spawn thread {}: {}", index, err)).into());
                }
            }
        }

        if main_participates {
            state.rendezvous();
        }
        state.wait_started();

        if let Some(seconds) = workload.termination.seconds() {
            if state.sleep_unless_stopped(Duration::from_secs(seconds)) {
                log::warn!("run stopped before its {} second duration", seconds);
            }
            state.request_stop();
        }

        let mut contexts = Vec::with_capacity(threads);
        let mut first_error = None;
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(context)) => contexts.push(context),
                Ok(Err(err)) => {
                    log::error!("thread {}: {:#}", index, err);
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    log::error!("thread {} panicked", index);
                    state.request_stop();
                    first_error.get_or_insert_with(|| {
                        MaptrapError::resource(format!("thread {} panicked", index)).into()
                    });
                }
            }
        }
        let stopped = Timestamp::now();

        if let Some(err) = first_error {
            return Err(err);
        }

        let started = state
            .started_at()
            .context("run ended without a start timestamp")?;

        Ok(RunOutcome {
            threads: contexts,
            started,
            stopped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workload::{AccessMask, Termination, UnmapPolicy, Visibility};
    use crate::config::{TargetConfig, WorkloadConfig};
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    fn mapped(dir: &TempDir, size: u64) -> (File, Arc<MappedRegion>) {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dir.path().join("coord.dat"))
            .unwrap();
        file.set_len(size).unwrap();
        let region = MappedRegion::establish(file.as_raw_fd(), size, Visibility::Shared).unwrap();
        (file, Arc::new(region))
    }

    fn config(workload: WorkloadConfig) -> RunConfig {
        let mut config = RunConfig::new(workload, TargetConfig::new("/unused"));
        config.output.trace = TraceMode::Quiet;
        config
    }

    fn topology() -> CpuTopology {
        CpuTopology::detect()
    }

    #[test]
    fn test_main_participation() {
        let mut cfg = config(WorkloadConfig::default());
        assert!(Coordinator::new(&cfg, topology()).main_participates());
        cfg.output.trace = TraceMode::Verbose;
        assert!(!Coordinator::new(&cfg, topology()).main_participates());
    }

    #[test]
    fn test_loop_run_counts_every_thread() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 1 << 20);
        let threads = topology().logical_cpus().min(4);
        let cfg = config(WorkloadConfig {
            access: AccessMask::BOTH,
            termination: Termination::Loops(100),
            threads,
            ..Default::default()
        });

        let outcome = Coordinator::new(&cfg, topology())
            .run(region.clone(), file.as_raw_fd())
            .unwrap();
        assert_eq!(outcome.threads.len(), threads);
        assert!(outcome.threads.iter().all(|t| t.accesses == 200));
        let indices: Vec<usize> = outcome.threads.iter().map(|t| t.index).collect();
        assert_eq!(indices, (0..threads).collect::<Vec<_>>());

        Arc::try_unwrap(region).unwrap().release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_duration_run_lasts_about_as_configured() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 1 << 20);
        let cfg = config(WorkloadConfig {
            access: AccessMask::READ,
            termination: Termination::Seconds(1),
            ..Default::default()
        });

        let outcome = Coordinator::new(&cfg, topology())
            .run(region.clone(), file.as_raw_fd())
            .unwrap();
        let elapsed = outcome.elapsed();
        assert!(elapsed >= Duration::from_millis(950), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
        assert!(outcome.threads[0].accesses > 0);

        Arc::try_unwrap(region).unwrap().release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_bounds_violation_ends_duration_run_early() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let cfg = config(WorkloadConfig {
            access: AccessMask::READ,
            offset: 8192,
            termination: Termination::Seconds(30),
            ..Default::default()
        });

        let begin = std::time::Instant::now();
        let err = Coordinator::new(&cfg, topology())
            .run(region.clone(), file.as_raw_fd())
            .unwrap_err();
        assert!(begin.elapsed() < Duration::from_secs(10));
        assert!(matches!(
            err.downcast_ref::<MaptrapError>(),
            Some(MaptrapError::BoundsViolation { offset: 8192, size: 4096 })
        ));

        Arc::try_unwrap(region).unwrap().release(file, UnmapPolicy::Full);
    }
}
