//! Statistics aggregation
//!
//! Merges per-thread access counters into a [`RunSummary`].
//!
//! # Example
//!
//! ```
//! use maptrap::stats::aggregator::StatisticsAggregator;
//! use std::time::Duration;
//!
//! let mut aggregator = StatisticsAggregator::new(64);
//! aggregator.add_thread(0, 0, 3_000_000);
//! aggregator.add_thread(1, 1, 1_000_000);
//!
//! let summary = aggregator.summarize(Duration::from_secs(2));
//! assert_eq!(summary.total_accesses, 4_000_000);
//! let rates = summary.throughput.unwrap();
//! assert_eq!(rates.accesses_per_sec, 2_000_000);
//! assert_eq!(rates.accesses_per_thread_per_sec, 1_000_000);
//! assert_eq!(rates.cache_mb_per_sec, Some(2_000_000 >> 14));
//! ```

use super::{RunSummary, ThreadCount, Throughput, RATE_THRESHOLD_SECS};
use crate::config::workload::CACHE_LINE;
use crate::coordinator::RunOutcome;
use std::collections::BTreeMap;
use std::time::Duration;

/// Collects per-thread counters and computes the run summary
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    /// Per-thread counters (thread index → count)
    threads: BTreeMap<usize, ThreadCount>,

    /// Stride of the run; cache traffic is only meaningful at cache-line stride
    stride: i64,
}

impl StatisticsAggregator {
    pub fn new(stride: i64) -> Self {
        Self {
            threads: BTreeMap::new(),
            stride,
        }
    }

    /// Aggregator pre-filled with every thread of a finished run
    pub fn from_outcome(outcome: &RunOutcome, stride: i64) -> Self {
        let mut aggregator = Self::new(stride);
        for thread in &outcome.threads {
            aggregator.add_thread(thread.index, thread.cpu, thread.accesses);
        }
        aggregator
    }

    /// Record a thread's counter; a repeated index replaces the earlier one
    pub fn add_thread(&mut self, index: usize, cpu: usize, accesses: u64) {
        self.threads.insert(
            index,
            ThreadCount {
                index,
                cpu,
                accesses,
            },
        );
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn total_accesses(&self) -> u64 {
        self.threads.values().map(|t| t.accesses).sum()
    }

    /// Build the summary for a run that took `elapsed`
    pub fn summarize(&self, elapsed: Duration) -> RunSummary {
        let total = self.total_accesses();
        let secs = elapsed.as_secs_f64();

        let throughput = if secs > RATE_THRESHOLD_SECS {
            let aps = (total as f64 / secs) as u64;
            let nthreads = self.threads.len().max(1) as f64;
            Some(Throughput {
                accesses_per_sec: aps,
                accesses_per_thread_per_sec: (aps as f64 / nthreads) as u64,
                // 64 bytes per access, reported in MiB: << 6 >> 20
                cache_mb_per_sec: (self.stride >= CACHE_LINE as i64).then_some(aps >> 14),
            })
        } else {
            None
        };

        RunSummary {
            threads: self.threads.values().copied().collect(),
            total_accesses: total,
            elapsed_secs: secs,
            throughput,
        }
    }
}
