//! CPU affinity binding
//!
//! Every worker is pinned to exactly one logical CPU before it reaches the
//! start barrier. Which CPU is decided by the run's [`CpuPlacement`].
//!
//! # Platform Support
//!
//! CPU affinity is supported on Linux via `sched_setaffinity`. Elsewhere the
//! pinning call fails and the worker reports a resource error.
//!
//! # Example
//!
//! ```no_run
//! use maptrap::worker::affinity::{set_cpu_affinity, parse_cpu_list};
//!
//! // Bind to CPU cores 0, 2, 4
//! let cores = parse_cpu_list("0,2,4").unwrap();
//! set_cpu_affinity(&cores).unwrap();
//! ```

use crate::config::workload::CpuPlacement;
use crate::util::topology::CpuTopology;
use crate::Result;
use anyhow::Context;
use std::time::Duration;

/// Time given to the scheduler to migrate a freshly pinned thread
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Set CPU affinity for the current thread
///
/// # Errors
///
/// Returns an error if the list is empty, an id is above 1023, or the
/// syscall fails.
#[cfg(target_os = "linux")]
pub fn set_cpu_affinity(cores: &[usize]) -> Result<()> {
    use libc::{cpu_set_t, CPU_SET, CPU_ZERO, sched_setaffinity};
    use std::mem;

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }

    unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);

        for &core in cores {
            if core >= 1024 {
                anyhow::bail!("CPU core ID {} is too large (max 1023)", core);
            }
            CPU_SET(core, &mut cpu_set);
        }

        let result = sched_setaffinity(
            0, // 0 = current thread
            mem::size_of::<cpu_set_t>(),
            &cpu_set,
        );

        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context(format!("sched_setaffinity to cores {:?} failed", cores));
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_cpu_affinity(_cores: &[usize]) -> Result<()> {
    anyhow::bail!("CPU affinity is only supported on Linux")
}

/// Pin the calling thread to `cpu` and let the scheduler move it there
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    set_cpu_affinity(&[cpu])?;
    std::thread::sleep(SETTLE_DELAY);
    Ok(())
}

/// Logical CPU that thread `index` runs on
///
/// Linear placement wraps modulo the CPU count. A list shorter than the
/// thread count is rejected by validation, but wraps here as well.
pub fn cpu_for_thread(placement: &CpuPlacement, topology: &CpuTopology, index: usize) -> usize {
    match placement {
        CpuPlacement::Linear => index % topology.logical_cpus(),
        CpuPlacement::CoreMajor => topology.core_major_cpu(index),
        CpuPlacement::List(cpus) if !cpus.is_empty() => cpus[index % cpus.len()],
        CpuPlacement::List(_) => index % topology.logical_cpus(),
    }
}

/// Parse a comma-separated list of CPU cores or ranges
///
/// Supports formats like:
/// - "0,1,2,3" - Individual cores
/// - "0-3" - Range of cores
/// - "0,2-4,7" - Mixed individual and ranges
///
/// Order is preserved, since thread i takes the i-th entry. Repeated ids
/// keep their first position.
///
/// ```
/// use maptrap::worker::affinity::parse_cpu_list;
///
/// let cores = parse_cpu_list("7,0,2-4").unwrap();
/// assert_eq!(cores, vec![7, 0, 2, 3, 4]);
/// ```
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();

        if part.contains('-') {
            // Range: "0-3"
            let range_parts: Vec<&str> = part.split('-').collect();
            if range_parts.len() != 2 {
                anyhow::bail!("Invalid CPU range format: {}", part);
            }

            let start: usize = range_parts[0]
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", range_parts[0]))?;
            let end: usize = range_parts[1]
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", range_parts[1]))?;

            if start > end {
                anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
            }

            for core in start..=end {
                if !cores.contains(&core) {
                    cores.push(core);
                }
            }
        } else {
            let core: usize = part
                .parse()
                .with_context(|| format!("Invalid CPU core number: {}", part))?;
            if !cores.contains(&core) {
                cores.push(core);
            }
        }
    }

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }

    Ok(cores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list_single() {
        let cores = parse_cpu_list("0").unwrap();
        assert_eq!(cores, vec![0]);
    }

    #[test]
    fn test_parse_cpu_list_range() {
        let cores = parse_cpu_list("0-3").unwrap();
        assert_eq!(cores, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_cpu_list_mixed() {
        let cores = parse_cpu_list("0, 2-4, 7").unwrap();
        assert_eq!(cores, vec![0, 2, 3, 4, 7]);
    }

    #[test]
    fn test_parse_cpu_list_keeps_order() {
        let cores = parse_cpu_list("3,1,2,0").unwrap();
        assert_eq!(cores, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_parse_cpu_list_duplicates() {
        let cores = parse_cpu_list("2,0,2,1-2").unwrap();
        assert_eq!(cores, vec![2, 0, 1]);
    }

    #[test]
    fn test_parse_cpu_list_errors() {
        assert!(parse_cpu_list("").is_err());
        assert!(parse_cpu_list("0,abc,2").is_err());
        assert!(parse_cpu_list("5-2").is_err());
        assert!(parse_cpu_list("0-2-4").is_err());
    }

    #[test]
    fn test_cpu_for_thread_linear() {
        let topo = CpuTopology::new(8, 4);
        assert_eq!(cpu_for_thread(&CpuPlacement::Linear, &topo, 0), 0);
        assert_eq!(cpu_for_thread(&CpuPlacement::Linear, &topo, 5), 5);
        assert_eq!(cpu_for_thread(&CpuPlacement::Linear, &topo, 9), 1);
    }

    #[test]
    fn test_cpu_for_thread_core_major() {
        let topo = CpuTopology::new(8, 4);
        let cpus: Vec<usize> = (0..8)
            .map(|i| cpu_for_thread(&CpuPlacement::CoreMajor, &topo, i))
            .collect();
        assert_eq!(cpus, vec![0, 2, 4, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn test_cpu_for_thread_list() {
        let topo = CpuTopology::new(8, 4);
        let placement = CpuPlacement::List(vec![6, 3]);
        assert_eq!(cpu_for_thread(&placement, &topo, 0), 6);
        assert_eq!(cpu_for_thread(&placement, &topo, 1), 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_set_cpu_affinity() {
        // CPU 0 is always online
        assert!(set_cpu_affinity(&[0]).is_ok());
    }

    #[test]
    fn test_set_cpu_affinity_rejects_large_id() {
        assert!(set_cpu_affinity(&[4096]).is_err());
        assert!(set_cpu_affinity(&[]).is_err());
    }
}
