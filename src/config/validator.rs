//! Configuration validation
//!
//! Everything here runs before any thread is spawned. A failure is a
//! [`MaptrapError::Config`]; the run never starts.

use super::*;
use crate::error::MaptrapError;
use crate::util::topology::CpuTopology;
use anyhow::Result;

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(MaptrapError::config(msg).into())
}

/// Validate complete configuration
pub fn validate_config(config: &RunConfig, topology: &CpuTopology) -> Result<()> {
    validate_workload(&config.workload)?;
    validate_threads(&config.workload, topology)?;
    validate_target(&config.target)?;
    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if workload.stride.unsigned_abs() < 4 {
        return invalid(format!("|stride| must be at least 4, got {}", workload.stride));
    }

    match workload.termination {
        Termination::Loops(0) => return invalid("loop count must be at least 1"),
        Termination::Seconds(0) => return invalid("duration must be at least 1 second"),
        _ => {}
    }

    if workload.sync_ops.len() > MAX_SYNC_OPS {
        return invalid(format!("Too many syncs ({} > {})", workload.sync_ops.len(), MAX_SYNC_OPS));
    }

    if workload.hiperf > 9 {
        return invalid(format!("hiperf kernel must be 1-9, got {}", workload.hiperf));
    }

    match workload.kernel() {
        Some(kernel) => {
            if kernel.is_walk() && workload.threads > KERNEL_MAX_THREADS {
                return invalid(format!(
                    "kernel {} is limited to {} threads * 64M == 2G files",
                    kernel.id(),
                    KERNEL_MAX_THREADS
                ));
            }
            if !workload.sync_ops.is_empty() {
                log::warn!("flush options are ignored by kernel {}", kernel.id());
            }
        }
        None => {
            if workload.access.is_empty() {
                return invalid("Use at least one of -R|-W, or -h which ignores them");
            }
        }
    }

    Ok(())
}

/// Validate thread count and placement against the machine
pub fn validate_threads(workload: &WorkloadConfig, topology: &CpuTopology) -> Result<()> {
    let cpus = topology.logical_cpus();

    if workload.threads > 1 && cpus == 1 {
        return invalid("Can't effectively multithread on a nosmp system");
    }
    if workload.threads < 1 || workload.threads > cpus {
        return invalid(format!("{} threads? Must be between 1 and {}", workload.threads, cpus));
    }

    if let CpuPlacement::List(ref list) = workload.placement {
        if list.len() < workload.threads {
            return invalid(format!(
                "CPU list has {} entries for {} threads",
                list.len(),
                workload.threads
            ));
        }
        if let Some(cpu) = list.iter().find(|&&cpu| cpu >= cpus) {
            return invalid(format!("CPU {} does not exist (have {})", cpu, cpus));
        }
    }

    Ok(())
}

/// Validate target preparation options
pub fn validate_target(target: &TargetConfig) -> Result<()> {
    if target.path.as_os_str().is_empty() {
        return invalid("target path cannot be empty");
    }
    if target.create.is_none() && (target.delete_first || target.close_after_create) {
        log::warn!("delete/close options only apply when creating the file");
    }
    Ok(())
}

/// Validate the workload against the size of the file actually mapped
///
/// The offset is deliberately not checked here: an offset beyond EOF without
/// overcommit is a fault the engine raises at access time.
pub fn validate_file_size(workload: &WorkloadConfig, file_size: u64) -> Result<()> {
    if file_size < 4 {
        return invalid(format!("file size {} cannot hold a single word", file_size));
    }

    match workload.kernel() {
        Some(kernel) if kernel.needs_window() => {
            if file_size < KERNEL_WINDOW {
                return invalid(format!(
                    "kernel {} needs a file of at least 2G, have {}",
                    kernel.id(),
                    file_size
                ));
            }
        }
        Some(_) => {
            let needed = CACHE_LINE * workload.threads as u64;
            if file_size < needed {
                return invalid(format!(
                    "kernel 1 needs {} bytes for {} threads, have {}",
                    needed, workload.threads, file_size
                ));
            }
        }
        None => {
            if !workload.jump_around && workload.stride.unsigned_abs() > file_size {
                return invalid(format!(
                    "|stride| {} exceeds file size {}",
                    workload.stride.unsigned_abs(),
                    file_size
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> CpuTopology {
        CpuTopology::new(8, 4)
    }

    fn read_workload() -> WorkloadConfig {
        WorkloadConfig {
            access: AccessMask::READ,
            ..Default::default()
        }
    }

    fn is_config_error(result: Result<()>) -> bool {
        matches!(
            result.unwrap_err().downcast_ref::<MaptrapError>(),
            Some(MaptrapError::Config(_))
        )
    }

    #[test]
    fn test_valid_workload() {
        assert!(validate_workload(&read_workload()).is_ok());
    }

    #[test]
    fn test_stride_too_small() {
        let mut workload = read_workload();
        workload.stride = 2;
        assert!(is_config_error(validate_workload(&workload)));
        workload.stride = -3;
        assert!(is_config_error(validate_workload(&workload)));
        workload.stride = -4;
        assert!(validate_workload(&workload).is_ok());
    }

    #[test]
    fn test_access_bits_required_without_kernel() {
        let workload = WorkloadConfig::default();
        assert!(is_config_error(validate_workload(&workload)));

        let kernel = WorkloadConfig {
            hiperf: 1,
            ..Default::default()
        };
        assert!(validate_workload(&kernel).is_ok());
    }

    #[test]
    fn test_kernel_id_range() {
        let mut workload = read_workload();
        workload.hiperf = 10;
        assert!(is_config_error(validate_workload(&workload)));
    }

    #[test]
    fn test_walk_kernel_thread_cap() {
        let mut workload = read_workload();
        workload.hiperf = 5;
        workload.threads = 33;
        assert!(is_config_error(validate_workload(&workload)));
        workload.threads = 32;
        assert!(validate_workload(&workload).is_ok());
        // random kernels are not partitioned
        workload.hiperf = 8;
        workload.threads = 64;
        assert!(validate_workload(&workload).is_ok());
    }

    #[test]
    fn test_too_many_syncs() {
        let mut workload = read_workload();
        workload.sync_ops = vec![SyncOp::Msync; MAX_SYNC_OPS + 1];
        assert!(is_config_error(validate_workload(&workload)));
    }

    #[test]
    fn test_zero_termination() {
        let mut workload = read_workload();
        workload.termination = Termination::Loops(0);
        assert!(is_config_error(validate_workload(&workload)));
        workload.termination = Termination::Seconds(0);
        assert!(is_config_error(validate_workload(&workload)));
    }

    #[test]
    fn test_thread_limits() {
        let mut workload = read_workload();
        workload.threads = 0;
        assert!(is_config_error(validate_threads(&workload, &topology())));
        workload.threads = 9;
        assert!(is_config_error(validate_threads(&workload, &topology())));
        workload.threads = 8;
        assert!(validate_threads(&workload, &topology()).is_ok());
    }

    #[test]
    fn test_nosmp_refuses_threads() {
        let mut workload = read_workload();
        workload.threads = 2;
        assert!(is_config_error(validate_threads(&workload, &CpuTopology::new(1, 1))));
    }

    #[test]
    fn test_cpu_list_checks() {
        let mut workload = read_workload();
        workload.threads = 2;
        workload.placement = CpuPlacement::List(vec![3]);
        assert!(is_config_error(validate_threads(&workload, &topology())));
        workload.placement = CpuPlacement::List(vec![3, 12]);
        assert!(is_config_error(validate_threads(&workload, &topology())));
        workload.placement = CpuPlacement::List(vec![3, 7]);
        assert!(validate_threads(&workload, &topology()).is_ok());
    }

    #[test]
    fn test_kernel_file_size() {
        let mut workload = read_workload();
        workload.hiperf = 2;
        assert!(is_config_error(validate_file_size(&workload, KERNEL_WINDOW - 1)));
        assert!(validate_file_size(&workload, KERNEL_WINDOW).is_ok());

        workload.hiperf = 1;
        workload.threads = 4;
        assert!(is_config_error(validate_file_size(&workload, 255)));
        assert!(validate_file_size(&workload, 256).is_ok());
    }

    #[test]
    fn test_general_file_size() {
        let mut workload = read_workload();
        assert!(is_config_error(validate_file_size(&workload, 3)));
        workload.stride = -64;
        assert!(is_config_error(validate_file_size(&workload, 32)));
        assert!(validate_file_size(&workload, 64).is_ok());
    }

    #[test]
    fn test_offset_beyond_eof_is_not_a_config_error() {
        let mut workload = read_workload();
        workload.offset = 1 << 40;
        assert!(validate_file_size(&workload, 4096).is_ok());
    }

    #[test]
    fn test_validate_config_full() {
        let config = RunConfig::new(read_workload(), TargetConfig::new("/tmp/maptrap"));
        assert!(validate_config(&config, &topology()).is_ok());
    }
}
