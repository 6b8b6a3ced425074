//! Error taxonomy
//!
//! Every failure maptrap can report falls in one of four classes. Only
//! [`MaptrapError::Sync`] is recoverable; the access loop logs it and moves
//! on. Everything else ends the run.

use thiserror::Error;

/// Errors raised by the workload core.
#[derive(Debug, Error)]
pub enum MaptrapError {
    /// Invalid or conflicting parameters, detected before any thread spawns.
    #[error("configuration error: {0}")]
    Config(String),

    /// Mapping, thread creation, affinity or barrier failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// A computed access would land beyond EOF while overcommit is off.
    #[error("access offset {offset} beyond EOF (file size {size})")]
    BoundsViolation {
        /// Offending byte offset.
        offset: u64,
        /// Size of the mapped file.
        size: u64,
    },

    /// A flush operation failed.
    #[error("{op} failed: {source}")]
    Sync {
        /// Name of the flush (fsync, fdatasync, msync).
        op: &'static str,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

impl MaptrapError {
    /// Build a configuration error from anything printable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a resource error from anything printable.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BoundsViolation { .. } => 2,
            _ => 1,
        }
    }
}
