//! maptrap - Concurrent mmap workload generator
//!
//! maptrap drives controlled access patterns against a memory-mapped file to
//! measure throughput and to reproduce kernel memory-management faults on
//! purpose (for example page faults beyond EOF under "overcommit").
//!
//! # Architecture
//!
//! - **Mapping manager**: establishes and releases the file mapping
//! - **Access pattern engine**: linear, reverse, jump-around and canned kernels
//! - **Coordinator**: barrier start, stop flag, worker spawn and join
//! - **Statistics**: per-thread counters merged into throughput figures

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod output;
pub mod stats;
pub mod target;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::{RunConfig, WorkloadConfig};
pub use error::MaptrapError;

/// Result type used throughout maptrap
pub type Result<T> = anyhow::Result<T>;
