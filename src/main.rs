//! maptrap CLI entry point

use anyhow::{Context, Result};
use maptrap::config::cli::Cli;
use maptrap::config::{cli_convert, validator, RunConfig};
use maptrap::coordinator::Coordinator;
use maptrap::engine::region::MappedRegion;
use maptrap::output::{json, text};
use maptrap::stats::StatisticsAggregator;
use maptrap::target::prepare_target;
use maptrap::util::topology::CpuTopology;
use maptrap::util::trace::Tracer;
use maptrap::MaptrapError;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("maptrap: {:#}", err);
        let code = err
            .downcast_ref::<MaptrapError>()
            .map_or(1, MaptrapError::exit_code);
        std::process::exit(code);
    }
}

/// `-v` raises the default level one step per flag; `RUST_LOG` wins
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let topology = CpuTopology::detect();
    log::info!(
        "{} logical CPUs, {} cores, {} threads per core",
        topology.logical_cpus(),
        topology.cores(),
        topology.threads_per_core()
    );

    let config = cli_convert::build_config_from_cli(cli, &topology)?;
    validator::validate_config(&config, &topology).context("Configuration validation failed")?;

    if cli.dry_run {
        if config.output.verbose > 0 {
            print!("{}", maptrap::config::toml::to_toml_string(&config)?);
        }
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    println!("{:3} threads will be spawned", config.workload.threads);
    execute(&config, topology)
}

fn execute(config: &RunConfig, topology: CpuTopology) -> Result<()> {
    let workload = &config.workload;
    let tracer = Tracer::new(config.output.trace, workload.no_sleep);

    let target = prepare_target(&config.target, &tracer)?;
    validator::validate_file_size(workload, target.size)?;

    let fd = target.file.as_raw_fd();
    let region = Arc::new(MappedRegion::establish(fd, target.size, workload.visibility)?);
    if tracer.is_active() {
        println!(
            "PID = {}, map range = {:#x} - {:#x}",
            std::process::id(),
            region.base_addr(),
            region.last_addr()
        );
    }

    let outcome = Coordinator::new(config, topology).run(Arc::clone(&region), fd)?;

    let summary = StatisticsAggregator::from_outcome(&outcome, workload.stride).summarize(outcome.elapsed());
    text::print_summary(&summary, config.output.verbose > 0);

    if let Some(ref path) = config.output.json {
        let report = json::build_report(config, region.size(), &summary);
        json::write_json_report(path, &report, true)?;
        log::info!("JSON report written to {}", path.display());
    }

    match Arc::try_unwrap(region) {
        Ok(region) => region.release(target.file, workload.unmap),
        Err(_) => log::warn!("mapping still referenced at exit, leaving release to drop"),
    }

    Ok(())
}
