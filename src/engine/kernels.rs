//! High-performance kernels
//!
//! Tight loops over the first 2 GiB of the mapping. They skip tracing,
//! flushes and loop budgets; only the stop flag ends them.

use super::{AccessEngine, RunContext};
use crate::config::workload::{Kernel, Window, CACHE_LINE, KERNEL_SLICE, KERNEL_WINDOW};
use crate::worker::ThreadContext;
use crate::Result;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::Ordering;

/// Value stored by the walk-write kernels
pub const WALK_STORE_VALUE: u32 = 42;

/// Cache-line walk through the kernel window
///
/// Thread `i` starts at `i * 64 MiB`. A full walk wraps at 2 GiB back to 0;
/// a chunked walk wraps at the end of its own slice back to the slice start.
#[derive(Debug, Clone)]
pub struct CacheLineWalk {
    pos: u64,
    limit: u64,
    reset: u64,
}

impl CacheLineWalk {
    pub fn new(index: usize, window: Window) -> Self {
        let start = index as u64 * KERNEL_SLICE;
        match window {
            Window::Full => Self {
                pos: start,
                limit: KERNEL_WINDOW,
                reset: 0,
            },
            Window::Chunked => Self {
                pos: start,
                limit: start + KERNEL_SLICE,
                reset: start,
            },
        }
    }
}

impl Iterator for CacheLineWalk {
    type Item = u64;

    #[inline(always)]
    fn next(&mut self) -> Option<u64> {
        let offset = self.pos;
        self.pos += CACHE_LINE;
        if self.pos >= self.limit {
            self.pos = self.reset;
        }
        Some(offset)
    }
}

/// Random 4-byte aligned offset inside the kernel window
#[inline(always)]
pub fn random_offset(rng: &mut Xoshiro256PlusPlus) -> u64 {
    rng.next_u64() & (KERNEL_WINDOW - 1) & !3
}

/// Engine running one canned kernel
pub struct KernelEngine {
    kernel: Kernel,
}

impl KernelEngine {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }
}

impl AccessEngine for KernelEngine {
    fn name(&self) -> &'static str {
        "kernel"
    }

    fn run(&mut self, ctx: &RunContext<'_>, thread: &mut ThreadContext) -> Result<()> {
        let region = ctx.region;
        let stop = ctx.state.stop_flag();
        let mut count = 0u64;

        log::debug!(
            "thread {}: kernel {} ({})",
            thread.index,
            self.kernel.id(),
            self.kernel.description()
        );

        match self.kernel {
            Kernel::FixedCachelineRead => {
                let offset = CACHE_LINE * thread.index as u64;
                while !stop.load(Ordering::Relaxed) {
                    unsafe { region.load_raw(offset) };
                    count += 1;
                }
            }
            Kernel::WalkRead(window) => {
                let mut walk = CacheLineWalk::new(thread.index, window);
                while !stop.load(Ordering::Relaxed) {
                    if let Some(offset) = walk.next() {
                        unsafe { region.load_raw(offset) };
                    }
                    count += 1;
                }
            }
            Kernel::WalkWrite(window) => {
                let mut walk = CacheLineWalk::new(thread.index, window);
                while !stop.load(Ordering::Relaxed) {
                    if let Some(offset) = walk.next() {
                        unsafe { region.store_raw(offset, WALK_STORE_VALUE) };
                    }
                    count += 1;
                }
            }
            Kernel::WalkReadWrite(window) => {
                let mut walk = CacheLineWalk::new(thread.index, window);
                while !stop.load(Ordering::Relaxed) {
                    if let Some(offset) = walk.next() {
                        unsafe {
                            let value = region.load_raw(offset);
                            region.store_raw(offset, value);
                        }
                    }
                    count += 1;
                }
            }
            Kernel::RandomRead => {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(thread.seed);
                while !stop.load(Ordering::Relaxed) {
                    let offset = random_offset(&mut rng);
                    unsafe { region.load_raw(offset) };
                    count += 1;
                }
            }
            Kernel::RandomIncrement => {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(thread.seed);
                while !stop.load(Ordering::Relaxed) {
                    let offset = random_offset(&mut rng);
                    unsafe {
                        let value = region.load_raw(offset);
                        region.store_raw(offset, value.wrapping_add(1));
                    }
                    count += 2;
                }
            }
        }

        thread.accesses += count;
        Ok(())
    }
}
