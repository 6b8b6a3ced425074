//! Shared run state
//!
//! Holds the start barrier, the stop flag, the run start timestamp and the
//! jump-around generator. Everything else a worker touches is thread-local.

use crate::util::time::{unix_seconds, Timestamp};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, LockResult, Mutex, PoisonError};
use std::time::Duration;

/// Start barrier bookkeeping, guarded by one mutex
#[derive(Debug, Default)]
struct Gate {
    arrived: usize,
    started: Option<Timestamp>,
}

/// State shared by the coordinator, the workers and the main thread
pub struct SharedRunState {
    /// Parties expected at the start barrier
    participants: usize,
    /// Arrivals and the start timestamp, set by the last participant to arrive
    gate: Mutex<Gate>,
    /// Raised once; polled by every worker loop
    stop: AtomicBool,
    /// Signalled on every arrival, on start and on stop
    changed: Condvar,
    /// Generator behind jump-around offsets, shared process-wide
    jump_rng: Mutex<Xoshiro256PlusPlus>,
}

/// A panicking worker must not wedge the rest of the run
fn relock<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl SharedRunState {
    /// State for `participants` barrier parties, jump generator seeded from the clock
    pub fn new(participants: usize) -> Self {
        Self::with_seed(participants, unix_seconds())
    }

    /// State with an explicit jump-around seed
    pub fn with_seed(participants: usize, seed: u64) -> Self {
        Self {
            participants: participants.max(1),
            gate: Mutex::new(Gate::default()),
            stop: AtomicBool::new(false),
            changed: Condvar::new(),
            jump_rng: Mutex::new(Xoshiro256PlusPlus::seed_from_u64(seed)),
        }
    }

    /// Wait until every participant arrives
    ///
    /// Returns `Some(true)` for exactly one participant, the coordinator,
    /// which records the run start before returning. A stop requested before
    /// the last arrival releases the waiters with `None`.
    pub fn rendezvous(&self) -> Option<bool> {
        let mut gate = relock(self.gate.lock());
        gate.arrived += 1;
        if gate.arrived == self.participants && !self.stop_requested() {
            gate.started = Some(Timestamp::now());
            self.changed.notify_all();
            log::debug!("start barrier passed");
            return Some(true);
        }

        let gate = relock(
            self.changed
                .wait_while(gate, |g| g.started.is_none() && !self.stop_requested()),
        );
        gate.started.map(|_| false)
    }

    /// Start timestamp, if the barrier has been passed
    pub fn started_at(&self) -> Option<Timestamp> {
        relock(self.gate.lock()).started
    }

    /// Block until the start timestamp exists or a stop is requested
    pub fn wait_started(&self) -> Option<Timestamp> {
        let gate = relock(self.gate.lock());
        let gate = relock(
            self.changed
                .wait_while(gate, |g| g.started.is_none() && !self.stop_requested()),
        );
        gate.started
    }

    /// Raise the stop flag and wake anyone sleeping on it
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let _gate = relock(self.gate.lock());
        self.changed.notify_all();
    }

    #[inline(always)]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// The raw flag, for hot loops that poll it every step
    pub fn stop_flag(&self) -> &AtomicBool {
        &self.stop
    }

    /// Sleep up to `timeout`; returns true if a stop was requested meanwhile
    pub fn sleep_unless_stopped(&self, timeout: Duration) -> bool {
        let gate = relock(self.gate.lock());
        let _wait = relock(
            self.changed
                .wait_timeout_while(gate, timeout, |_| !self.stop_requested()),
        );
        self.stop_requested()
    }

    /// Next jump-around offset: uniform in `[0, size - 4)`, rounded down to 16
    pub fn jump_offset(&self, size: u64) -> u64 {
        let span = size.saturating_sub(4).max(1);
        let mut rng = relock(self.jump_rng.lock());
        rng.gen_range(0..span) & !15
    }
}
