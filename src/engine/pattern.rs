//! General access patterns
//!
//! The general engine walks a cursor over the mapping and performs up to two
//! word accesses per step (a load and/or an incrementing store), followed by
//! the configured flushes.
//!
//! Three traversals exist:
//!
//! - forward: start at `offset` (one file length further under overcommit),
//!   add the stride, wrap to 0 once the cursor would pass the last byte
//! - reverse: start at `size - |stride|`, subtract, wrap back to the start
//!   once the cursor would go below 0
//! - jump-around: every cursor is a fresh 16-byte aligned draw from the
//!   process-wide generator
//!
//! The loop budget is spent once per wrap when walking and once per step
//! otherwise. Jump-around never wraps, so it always spends per step.

use super::region::MappedRegion;
use super::sync::SyncPolicy;
use super::{AccessEngine, RunContext};
use crate::config::workload::{AccessMask, Termination};
use crate::config::WorkloadConfig;
use crate::error::MaptrapError;
use crate::worker::ThreadContext;
use crate::Result;

/// First value stored is one above this
pub const INITIAL_WRITE_VALUE: u32 = 0x4242_4241;

/// Traversal direction derived from stride and jump-around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward(u64),
    Reverse(u64),
    JumpAround,
}

/// Cursor-shaping part of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub stride: i64,
    pub offset: u64,
    pub overcommit: bool,
    pub walking: bool,
    pub jump_around: bool,
}

impl Pattern {
    pub fn from_workload(workload: &WorkloadConfig) -> Self {
        Self {
            stride: workload.stride,
            offset: workload.offset,
            overcommit: workload.overcommit,
            walking: workload.walking,
            jump_around: workload.jump_around,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.jump_around {
            Direction::JumpAround
        } else if self.stride < 0 {
            Direction::Reverse(self.stride.unsigned_abs())
        } else {
            Direction::Forward(self.stride.unsigned_abs())
        }
    }

    /// Fail if the configured offset lies at or beyond EOF without overcommit
    pub fn check_bounds(&self, size: u64) -> std::result::Result<(), MaptrapError> {
        if !self.overcommit && self.offset >= size {
            return Err(MaptrapError::BoundsViolation {
                offset: self.offset,
                size,
            });
        }
        Ok(())
    }
}

/// Position and remaining budget of one worker's traversal
#[derive(Debug, Clone)]
pub struct Cursor {
    direction: Direction,
    walking: bool,
    size: u64,
    offset: u64,
    remaining: u64,
    wraps: u64,
}

impl Cursor {
    /// Place the cursor at its first position
    ///
    /// `draw` supplies jump-around offsets and is only called for that
    /// traversal.
    pub fn start(pattern: &Pattern, size: u64, loops: u64, mut draw: impl FnMut() -> u64) -> Self {
        let direction = pattern.direction();
        let offset = match direction {
            Direction::Forward(_) if pattern.overcommit => pattern.offset.saturating_add(size),
            Direction::Forward(_) => pattern.offset,
            Direction::Reverse(stride) => size.saturating_sub(stride),
            Direction::JumpAround => draw(),
        };
        Self {
            direction,
            walking: pattern.walking && direction != Direction::JumpAround,
            size,
            offset,
            remaining: loops,
            wraps: 0,
        }
    }

    /// Byte offset of the next access
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Loop units left
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Number of times the traversal has wrapped
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    /// Move to the next position and spend budget
    pub fn advance(&mut self, mut draw: impl FnMut() -> u64) {
        let wrapped = match self.direction {
            Direction::Forward(stride) => {
                let next = self.offset.saturating_add(stride);
                if next >= self.size {
                    self.offset = 0;
                    true
                } else {
                    self.offset = next;
                    false
                }
            }
            Direction::Reverse(stride) => {
                if self.offset < stride {
                    self.offset = self.size.saturating_sub(stride);
                    true
                } else {
                    self.offset -= stride;
                    false
                }
            }
            Direction::JumpAround => {
                self.offset = draw();
                false
            }
        };

        if wrapped {
            self.wraps += 1;
        }
        if wrapped || !self.walking {
            self.remaining = self.remaining.saturating_sub(1);
        }
    }
}

/// Engine for every non-kernel workload
pub struct GeneralEngine {
    pattern: Pattern,
    access: AccessMask,
    termination: Termination,
    sync: SyncPolicy,
}

impl GeneralEngine {
    pub fn new(workload: &WorkloadConfig, sync: SyncPolicy) -> Self {
        Self {
            pattern: Pattern::from_workload(workload),
            access: workload.access,
            termination: workload.termination,
            sync,
        }
    }

    fn loops(&self) -> u64 {
        match self.termination {
            Termination::Loops(n) => n,
            Termination::Seconds(_) => u64::MAX,
        }
    }

    #[inline]
    fn step(&self, ctx: &RunContext<'_>, offset: u64, value: &mut u32, accesses: &mut u64) {
        let region: &MappedRegion = ctx.region;
        let eligible = ctx.coordinator;

        if self.access.read {
            ctx.tracer.step(
                eligible,
                format_args!("integer get @ {:#x}", region.addr_of(offset)),
            );
            let got = unsafe { region.load_raw(offset) };
            *accesses += 1;
            ctx.tracer.result(eligible, format_args!("    = {:#010x}", got));
        }

        if self.access.write {
            *value = value.wrapping_add(1);
            ctx.tracer.step(
                eligible,
                format_args!("integer put {:#010x} @ {:#x}", *value, region.addr_of(offset)),
            );
            unsafe { region.store_raw(offset, *value) };
            *accesses += 1;
        }

        if !self.sync.is_empty() {
            self.sync.apply(region, offset, &ctx.tracer, eligible);
        }
    }
}

impl AccessEngine for GeneralEngine {
    fn name(&self) -> &'static str {
        "general"
    }

    fn run(&mut self, ctx: &RunContext<'_>, thread: &mut ThreadContext) -> Result<()> {
        let size = ctx.region.size();
        // The offset never changes, so one check covers every step
        self.pattern.check_bounds(size)?;

        let bounded = !self.termination.is_duration();
        let mut cursor = Cursor::start(&self.pattern, size, self.loops(), || {
            ctx.state.jump_offset(size)
        });
        let mut value = INITIAL_WRITE_VALUE;
        let mut accesses = 0u64;

        log::debug!(
            "thread {}: {:?} from {:#x}, {}",
            thread.index,
            cursor.direction,
            cursor.offset(),
            self.termination
        );

        loop {
            self.step(ctx, cursor.offset(), &mut value, &mut accesses);
            ctx.tracer.pause();
            cursor.advance(|| ctx.state.jump_offset(size));

            if ctx.state.stop_requested() || (bounded && cursor.remaining() == 0) {
                break;
            }
        }

        thread.accesses += accesses;
        log::debug!(
            "thread {}: {} accesses, {} wraps",
            thread.index,
            accesses,
            cursor.wraps()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::workload::{SyncOp, UnmapPolicy, Visibility};
    use crate::coordinator::state::SharedRunState;
    use crate::util::trace::Tracer;
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const MIB16: u64 = 16 * 1024 * 1024;

    fn pattern(stride: i64) -> Pattern {
        Pattern {
            stride,
            offset: 0,
            overcommit: false,
            walking: false,
            jump_around: false,
        }
    }

    fn no_draw() -> u64 {
        panic!("only jump-around draws")
    }

    fn collect(cursor: &mut Cursor, steps: usize) -> Vec<u64> {
        let mut seen = Vec::with_capacity(steps);
        for _ in 0..steps {
            seen.push(cursor.offset());
            cursor.advance(no_draw);
        }
        seen
    }

    fn mapped(dir: &TempDir, size: u64) -> (File, MappedRegion) {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dir.path().join("pattern.dat"))
            .unwrap();
        file.set_len(size).unwrap();
        let region = MappedRegion::establish(file.as_raw_fd(), size, Visibility::Shared).unwrap();
        (file, region)
    }

    fn run_engine(workload: &WorkloadConfig, region: &MappedRegion, state: &SharedRunState) -> Result<u64> {
        let mut engine = GeneralEngine::new(workload, SyncPolicy::none());
        let ctx = RunContext {
            region,
            state,
            tracer: Tracer::quiet(),
            coordinator: true,
        };
        let mut thread = ThreadContext::new(0, 0);
        engine.run(&ctx, &mut thread)?;
        Ok(thread.accesses)
    }

    #[test]
    fn test_forward_offsets() {
        let mut cursor = Cursor::start(&pattern(4), MIB16, 3, no_draw);
        assert_eq!(collect(&mut cursor, 3), vec![0, 4, 8]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_forward_wraps_past_last_byte() {
        let mut cursor = Cursor::start(&pattern(4), 16, 100, no_draw);
        assert_eq!(collect(&mut cursor, 6), vec![0, 4, 8, 12, 0, 4]);
        assert_eq!(cursor.wraps(), 1);

        let mut cursor = Cursor::start(&pattern(8), 20, 100, no_draw);
        assert_eq!(collect(&mut cursor, 4), vec![0, 8, 16, 0]);

        // 16 is still inside an 18 byte file
        let mut cursor = Cursor::start(&pattern(8), 18, 100, no_draw);
        assert_eq!(collect(&mut cursor, 4), vec![0, 8, 16, 0]);
    }

    #[test]
    fn test_forward_starts_at_offset() {
        let mut p = pattern(64);
        p.offset = 4096;
        let cursor = Cursor::start(&p, MIB16, 1, no_draw);
        assert_eq!(cursor.offset(), 4096);
    }

    #[test]
    fn test_overcommit_starts_beyond_eof_then_wraps() {
        let mut p = pattern(4);
        p.overcommit = true;
        p.offset = 8;
        let mut cursor = Cursor::start(&p, 4096, 10, no_draw);
        assert_eq!(cursor.offset(), 4096 + 8);
        cursor.advance(no_draw);
        assert_eq!(cursor.offset(), 0);
    }

    #[test]
    fn test_reverse_wraps_to_top() {
        let mut cursor = Cursor::start(&pattern(-4), 16, 100, no_draw);
        assert_eq!(collect(&mut cursor, 6), vec![12, 8, 4, 0, 12, 8]);
        assert_eq!(cursor.wraps(), 1);
    }

    #[test]
    fn test_walking_spends_per_wrap() {
        // 16 byte file, stride 4: four accesses per pass
        let mut p = pattern(4);
        p.walking = true;
        let mut cursor = Cursor::start(&p, 16, 2, no_draw);
        let mut steps = 0;
        loop {
            steps += 1;
            cursor.advance(no_draw);
            if cursor.remaining() == 0 {
                break;
            }
        }
        assert_eq!(steps, 8);
    }

    #[test]
    fn test_walking_pass_length_is_ceil() {
        // (size, offset, stride): one pass is ceil((size - offset) / stride) steps
        for (size, offset, stride) in [(100u64, 0u64, 12i64), (16, 2, 4), (18, 0, 8), (4097, 0, 64)] {
            let mut p = pattern(stride);
            p.walking = true;
            p.offset = offset;
            let mut cursor = Cursor::start(&p, size, 1, no_draw);
            let mut steps = 0;
            while cursor.remaining() > 0 {
                steps += 1;
                cursor.advance(no_draw);
            }
            let expected = (size - offset).div_ceil(stride as u64);
            assert_eq!(steps, expected, "size {} offset {} stride {}", size, offset, stride);
        }
    }

    #[test]
    fn test_reverse_walking_spends_per_wrap() {
        let mut p = pattern(-8);
        p.walking = true;
        let mut cursor = Cursor::start(&p, 64, 3, no_draw);
        let mut steps = 0;
        while cursor.remaining() > 0 {
            steps += 1;
            cursor.advance(no_draw);
        }
        assert_eq!(steps, 24);
    }

    #[test]
    fn test_jump_around_ignores_walking() {
        let mut p = pattern(4);
        p.walking = true;
        p.jump_around = true;
        let mut next = 0u64;
        let mut draw = || {
            next += 16;
            next
        };
        let mut cursor = Cursor::start(&p, 4096, 3, &mut draw);
        assert_eq!(cursor.offset(), 16);
        cursor.advance(&mut draw);
        cursor.advance(&mut draw);
        cursor.advance(&mut draw);
        assert_eq!(cursor.offset(), 64);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.wraps(), 0);
    }

    #[test]
    fn test_bounds_check() {
        let mut p = pattern(4);
        p.offset = 4096;
        assert!(matches!(
            p.check_bounds(4096),
            Err(MaptrapError::BoundsViolation { offset: 4096, size: 4096 })
        ));
        p.overcommit = true;
        assert!(p.check_bounds(4096).is_ok());
        p.overcommit = false;
        p.offset = 4095;
        assert!(p.check_bounds(4096).is_ok());
    }

    #[test]
    fn test_read_write_three_loops() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, MIB16);
        let workload = WorkloadConfig {
            access: AccessMask::BOTH,
            termination: Termination::Loops(3),
            ..Default::default()
        };
        let state = SharedRunState::new(1);
        assert_eq!(run_engine(&workload, &region, &state).unwrap(), 6);

        assert_eq!(region.read_u32(0), Some(0x4242_4242));
        assert_eq!(region.read_u32(4), Some(0x4242_4243));
        assert_eq!(region.read_u32(8), Some(0x4242_4244));
        assert_eq!(region.read_u32(12), Some(0));
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_walking_run_counts() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let workload = WorkloadConfig {
            access: AccessMask::READ,
            stride: 64,
            walking: true,
            termination: Termination::Loops(2),
            ..Default::default()
        };
        let state = SharedRunState::new(1);
        assert_eq!(run_engine(&workload, &region, &state).unwrap(), 2 * 64);
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_bounds_violation_before_any_access() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let workload = WorkloadConfig {
            access: AccessMask::WRITE,
            offset: 8192,
            ..Default::default()
        };
        let state = SharedRunState::new(1);
        let err = run_engine(&workload, &region, &state).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MaptrapError>(),
            Some(MaptrapError::BoundsViolation { .. })
        ));
        assert_eq!(region.read_u32(0), Some(0));
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_jump_around_run_stays_in_bounds() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 64 * 1024);
        let workload = WorkloadConfig {
            access: AccessMask::BOTH,
            jump_around: true,
            termination: Termination::Loops(5000),
            ..Default::default()
        };
        let state = SharedRunState::new(1);
        assert_eq!(run_engine(&workload, &region, &state).unwrap(), 10_000);
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_sync_failures_do_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let workload = WorkloadConfig {
            access: AccessMask::READ,
            termination: Termination::Loops(4),
            sync_ops: vec![SyncOp::Fsync],
            ..Default::default()
        };
        let mut engine = GeneralEngine::new(&workload, SyncPolicy::new(workload.sync_ops.clone(), -1));
        let state = SharedRunState::new(1);
        let ctx = RunContext {
            region: &region,
            state: &state,
            tracer: Tracer::quiet(),
            coordinator: true,
        };
        let mut thread = ThreadContext::new(0, 0);
        engine.run(&ctx, &mut thread).unwrap();
        assert_eq!(thread.accesses, 4);
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_duration_run_stops_on_flag() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let region = Arc::new(region);
        let state = Arc::new(SharedRunState::new(1));
        let workload = WorkloadConfig {
            access: AccessMask::READ,
            termination: Termination::Seconds(1),
            ..Default::default()
        };

        let handle = {
            let region = region.clone();
            let state = state.clone();
            std::thread::spawn(move || run_engine(&workload, &region, &state).unwrap())
        };
        let begin = Instant::now();
        std::thread::sleep(Duration::from_millis(100));
        state.request_stop();
        let accesses = handle.join().unwrap();
        assert!(accesses > 0);
        assert!(begin.elapsed() < Duration::from_secs(5));

        let region = Arc::try_unwrap(region).unwrap();
        region.release(file, UnmapPolicy::Full);
    }

    #[test]
    fn test_stop_still_runs_one_step() {
        let dir = TempDir::new().unwrap();
        let (file, region) = mapped(&dir, 4096);
        let workload = WorkloadConfig {
            access: AccessMask::BOTH,
            termination: Termination::Loops(100),
            ..Default::default()
        };
        let state = SharedRunState::new(1);
        state.request_stop();
        assert_eq!(run_engine(&workload, &region, &state).unwrap(), 2);
        region.release(file, UnmapPolicy::Full);
    }
}
