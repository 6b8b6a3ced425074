//! CPU topology discovery
//!
//! Only the three numbers the placement logic needs: logical CPUs, physical
//! cores, and hardware threads per core.

/// Logical CPU layout of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTopology {
    logical: usize,
    cores: usize,
}

impl CpuTopology {
    /// Build a topology from explicit counts (both clamped to at least 1)
    pub fn new(logical: usize, cores: usize) -> Self {
        let logical = logical.max(1);
        let cores = cores.clamp(1, logical);
        Self { logical, cores }
    }

    /// Detect the running machine's topology
    pub fn detect() -> Self {
        let logical = num_cpus::get();
        let cores = num_cpus::get_physical();
        let topology = Self::new(logical, cores);

        if logical % topology.cores != 0 {
            log::warn!(
                "{} logical CPUs do not divide evenly over {} cores; core-major placement degrades",
                logical,
                cores
            );
        }

        log::info!("{:4} logical CPUs reported", topology.logical);
        log::info!("{:4} cores", topology.cores);
        log::info!("{:4} threads per core", topology.threads_per_core());
        topology
    }

    pub fn logical_cpus(&self) -> usize {
        self.logical
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub fn threads_per_core(&self) -> usize {
        (self.logical / self.cores).max(1)
    }

    /// Logical CPU for thread `index` under core-major ordering
    ///
    /// Consecutive threads land on different cores first (0, tpc, 2*tpc, ...)
    /// and only wrap onto sibling hardware threads once every core has one.
    /// Sibling threads of a core are assumed to be numbered contiguously.
    pub fn core_major_cpu(&self, index: usize) -> usize {
        let tpc = self.threads_per_core();
        let cpu = (index % self.cores) * tpc + index / self.cores;
        cpu % self.logical
    }
}
