//! Flush policy
//!
//! An ordered list of flushes applied after every general-mode access. A
//! failed flush is reported and the loop carries on; it never ends the run.

use super::region::MappedRegion;
use crate::config::workload::SyncOp;
use crate::error::MaptrapError;
use crate::util::trace::Tracer;
use std::os::unix::io::RawFd;

/// Ordered flushes plus the descriptor they apply to
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    ops: Vec<SyncOp>,
    fd: RawFd,
}

impl SyncPolicy {
    pub fn new(ops: Vec<SyncOp>, fd: RawFd) -> Self {
        Self { ops, fd }
    }

    /// A policy with nothing to do
    pub fn none() -> Self {
        Self::new(Vec::new(), -1)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every flush in order for the access just made at `offset`
    ///
    /// Returns the number of flushes that failed. Failures are logged.
    pub fn apply(&self, region: &MappedRegion, offset: u64, tracer: &Tracer, eligible: bool) -> usize {
        let mut failures = 0;
        for &op in &self.ops {
            match op {
                SyncOp::Msync => tracer.step(
                    eligible,
                    format_args!("msync page @ {:#x}", region.addr_of(offset)),
                ),
                _ => tracer.step(eligible, format_args!("{}", op.name())),
            }
            if let Err(err) = self.flush(op, region, offset) {
                log::error!("{}", err);
                failures += 1;
            }
        }
        failures
    }

    fn flush(&self, op: SyncOp, region: &MappedRegion, offset: u64) -> Result<(), MaptrapError> {
        let result = match op {
            SyncOp::Fsync => check(unsafe { libc::fsync(self.fd) }),
            SyncOp::Fdatasync => check(fdatasync(self.fd)),
            SyncOp::Msync => region.msync_page(offset),
        };
        result.map_err(|source| MaptrapError::Sync {
            op: op.name(),
            source,
        })
    }
}

fn check(result: libc::c_int) -> std::io::Result<()> {
    if result < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn fdatasync(fd: RawFd) -> libc::c_int {
    unsafe { libc::fdatasync(fd) }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn fdatasync(fd: RawFd) -> libc::c_int {
    unsafe { libc::fsync(fd) }
}
