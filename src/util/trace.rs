//! Step tracing and single-step prompts
//!
//! In verbose mode each traced step is printed and the general loop pauses a
//! second between steps. In step mode the user presses Enter before every
//! traced operation. Only one thread (the coordinator) ever prints or
//! prompts, so output from different workers never interleaves.

use crate::config::workload::TraceMode;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Delay between general-mode steps in verbose mode
pub const STEP_DELAY: Duration = Duration::from_secs(1);

/// Per-run tracing policy, copied into every worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracer {
    mode: TraceMode,
    no_sleep: bool,
}

impl Tracer {
    pub fn new(mode: TraceMode, no_sleep: bool) -> Self {
        Self { mode, no_sleep }
    }

    /// A tracer that never prints, prompts or sleeps
    pub fn quiet() -> Self {
        Self::new(TraceMode::Quiet, true)
    }

    /// True when per-step output is wanted at all
    pub fn is_active(&self) -> bool {
        self.mode != TraceMode::Quiet
    }

    /// Announce (verbose) or prompt for (step) the next operation
    pub fn step(&self, eligible: bool, what: fmt::Arguments<'_>) {
        if !eligible {
            return;
        }
        match self.mode {
            TraceMode::Quiet => {}
            TraceMode::Verbose => println!("{}", what),
            TraceMode::Step => {
                print!("\nPress return to {}...", what);
                let _ = io::stdout().flush();
                let mut line = String::new();
                let _ = io::stdin().lock().read_line(&mut line);
            }
        }
    }

    /// Print the outcome of a traced operation
    pub fn result(&self, eligible: bool, what: fmt::Arguments<'_>) {
        if eligible && self.is_active() {
            println!("{}", what);
        }
    }

    /// Whether the general loop should sleep between steps
    pub fn pauses(&self) -> bool {
        self.mode == TraceMode::Verbose && !self.no_sleep
    }

    /// Sleep between general-mode steps when the policy asks for it
    pub fn pause(&self) {
        if self.pauses() {
            std::thread::sleep(STEP_DELAY);
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::quiet()
    }
}
