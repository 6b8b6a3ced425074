//! CLI to Config conversion utilities

use crate::config::cli::Cli;
use crate::config::workload::*;
use crate::config::{RunConfig, TargetConfig, WorkloadConfig};
use crate::error::MaptrapError;
use crate::util::topology::CpuTopology;
use crate::worker::affinity::parse_cpu_list;
use anyhow::{Context, Result};

/// Parse a size string (e.g., "4096", "64k", "16M", "2G") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let value = parse_signed_size(s)?;
    if value < 0 {
        anyhow::bail!("{} cannot be negative here", s.trim());
    }
    Ok(value as u64)
}

/// Parse a size string that may carry a sign (strides walk downward)
pub fn parse_signed_size(s: &str) -> Result<i64> {
    let s = s.trim().to_lowercase();

    let (num_str, shift) = if let Some(n) = s.strip_suffix("kb").or_else(|| s.strip_suffix('k')) {
        (n, 10)
    } else if let Some(n) = s.strip_suffix("mb").or_else(|| s.strip_suffix('m')) {
        (n, 20)
    } else if let Some(n) = s.strip_suffix("gb").or_else(|| s.strip_suffix('g')) {
        (n, 30)
    } else {
        (s.as_str(), 0)
    };

    let num: i64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(1i64 << shift)
        .ok_or_else(|| anyhow::anyhow!("Size out of range: {}", s))
}

/// Parse a byte offset; `0x` prefixes are read as hexadecimal
pub fn parse_offset(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).with_context(|| format!("Invalid hex offset: {}", s))
    } else {
        s.parse().with_context(|| format!("Invalid offset: {}", s))
    }
}

/// Parse a duration string (e.g., "60", "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("sec").or_else(|| s.strip_suffix('s')) {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("min").or_else(|| s.strip_suffix('m')) {
        (n, 60)
    } else if let Some(n) = s.strip_suffix("hr").or_else(|| s.strip_suffix('h')) {
        (n, 3600)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    Ok(num * multiplier)
}

/// Resolve a thread count: a number, `ALL` (every logical CPU) or `CORES`
/// (one thread per physical core)
pub fn resolve_threads(spec: &str, topology: &CpuTopology) -> Result<usize> {
    match spec.trim() {
        "ALL" => Ok(topology.logical_cpus()),
        "CORES" => Ok(topology.cores()),
        n => n
            .parse()
            .with_context(|| format!("Invalid thread count: {}", n)),
    }
}

/// Build the run configuration from the command line
///
/// With `--config` the TOML file is the base and flags given on the
/// command line override it; otherwise defaults are the base.
pub fn build_config_from_cli(cli: &Cli, topology: &CpuTopology) -> Result<RunConfig> {
    let base = match &cli.config {
        Some(path) => crate::config::toml::parse_toml_file(path)?,
        None => {
            let path = cli
                .target
                .clone()
                .ok_or_else(|| MaptrapError::config("a target file is required"))?;
            RunConfig::new(WorkloadConfig::default(), TargetConfig::new(path))
        }
    };

    let mut config = merge_cli_with_config(cli, base, topology)?;
    config.apply_kernel_defaults();
    Ok(config)
}

/// Merge CLI arguments over a configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: RunConfig, topology: &CpuTopology) -> Result<RunConfig> {
    // Target preparation
    if let Some(ref path) = cli.target {
        config.target.path = path.clone();
    }
    if let Some(id) = cli.create {
        let mode = CreateMode::from_id(id)
            .ok_or_else(|| MaptrapError::config(format!("Unknown create option {}", id)))?;
        config.target.create = Some(mode);
    }
    config.target.delete_first |= cli.delete;
    config.target.close_after_create |= cli.close_after_create;
    config.target.read_first |= cli.read_first;
    if let Some(ref size) = cli.size {
        config.target.size = parse_size(size).context("Invalid file size")?;
    }

    // Mapping and access bits
    let workload = &mut config.workload;
    if cli.private {
        workload.visibility = Visibility::Private;
    } else if cli.shared {
        workload.visibility = Visibility::Shared;
    }
    workload.access.read |= cli.read;
    workload.access.write |= cli.write;

    if !cli.sync_sequence.is_empty() {
        workload.sync_ops = cli.sync_sequence.clone();
    }

    // Pattern
    if let Some(id) = cli.hiperf {
        workload.hiperf = id;
    }
    workload.jump_around |= cli.jump_around;
    workload.overcommit |= cli.overcommit;
    workload.no_sleep |= cli.no_sleep;

    if cli.loops.is_some() || cli.seconds.is_some() {
        let loops = cli.loops.as_deref().map(parse_size).transpose().context("Invalid loop count")?;
        let seconds = cli.seconds.as_deref().map(parse_duration).transpose().context("Invalid duration")?;
        workload.termination = Termination::from_parts(loops, seconds)?;
    }

    if let Some(ref offset) = cli.offset {
        workload.offset = parse_offset(offset)?;
    }
    if let Some(ref stride) = cli.stride {
        workload.stride = parse_signed_size(stride).context("Invalid stride")?;
    }
    if let Some(ref walk) = cli.walk {
        workload.walking = true;
        workload.stride = parse_signed_size(walk).context("Invalid walk stride")?;
    }

    // Threads and placement
    if let Some(ref threads) = cli.threads {
        workload.threads = resolve_threads(threads, topology)?;
    }
    if cli.core_major {
        workload.placement = CpuPlacement::CoreMajor;
    } else if let Some(ref list) = cli.cpu_list {
        workload.placement = CpuPlacement::List(parse_cpu_list(list)?);
    }

    // Teardown
    if cli.no_unmap {
        workload.unmap = UnmapPolicy::Skip;
    } else if cli.legacy_unmap {
        workload.unmap = UnmapPolicy::LegacyPage;
    }

    // Output
    if cli.prompt {
        config.output.trace = TraceMode::Step;
    } else if cli.quiet {
        config.output.trace = TraceMode::Quiet;
    }
    config.output.verbose = config.output.verbose.max(cli.verbose);
    if let Some(ref json) = cli.json {
        config.output.json = Some(json.clone());
    }

    Ok(config)
}
