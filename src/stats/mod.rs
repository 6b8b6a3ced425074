//! Run statistics
//!
//! Workers count accesses privately and hand their counters over only after
//! they have been joined, so nothing here is shared or atomic.

pub mod aggregator;

pub use aggregator::StatisticsAggregator;

use serde::{Deserialize, Serialize};

/// Shortest run for which rates are reported
pub const RATE_THRESHOLD_SECS: f64 = 0.99;

/// Access counter of one joined worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCount {
    pub index: usize,
    pub cpu: usize,
    pub accesses: u64,
}

/// Rates derived from a run long enough to be meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    /// Total accesses per second
    pub accesses_per_sec: u64,
    /// `accesses_per_sec` divided by the thread count
    pub accesses_per_thread_per_sec: u64,
    /// Estimated cache traffic, only when every access is its own cache line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_mb_per_sec: Option<u64>,
}

/// Everything reported at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub threads: Vec<ThreadCount>,
    pub total_accesses: u64,
    pub elapsed_secs: f64,
    /// Absent when the run was shorter than [`RATE_THRESHOLD_SECS`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<Throughput>,
}

impl RunSummary {
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}
