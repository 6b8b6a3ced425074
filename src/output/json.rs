//! JSON output formatting
//!
//! One report per run: when it ran, what it ran against, the workload as
//! configured, and the summary the text output prints.

use crate::config::workload::{Termination, Visibility};
use crate::config::{RunConfig, WorkloadConfig};
use crate::stats::RunSummary;
use crate::Result;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Target details as mapped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonTarget {
    pub path: PathBuf,
    /// Size of the mapping actually established
    pub mapped_size: u64,
    pub visibility: Visibility,
}

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonReport {
    /// RFC 3339 UTC time the report was built
    pub generated_at: String,
    /// "general" or "kernel N"
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_description: Option<String>,
    pub target: JsonTarget,
    pub termination: Termination,
    pub workload: WorkloadConfig,
    pub summary: RunSummary,
}

/// Build the report for a finished run
pub fn build_report(config: &RunConfig, mapped_size: u64, summary: &RunSummary) -> JsonReport {
    let kernel = config.workload.kernel();
    JsonReport {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        mode: kernel.map_or_else(|| "general".to_string(), |k| format!("kernel {}", k.id())),
        kernel_description: kernel.map(|k| k.description().to_string()),
        target: JsonTarget {
            path: config.target.path.clone(),
            mapped_size,
            visibility: config.workload.visibility,
        },
        termination: config.workload.termination,
        workload: config.workload.clone(),
        summary: summary.clone(),
    }
}

/// Write JSON output to file
pub fn write_json_report(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON report: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, report)?;
    } else {
        serde_json::to_writer(file, report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::stats::{ThreadCount, Throughput};
    use tempfile::TempDir;

    fn summary() -> RunSummary {
        RunSummary {
            threads: vec![ThreadCount {
                index: 0,
                cpu: 3,
                accesses: 42,
            }],
            total_accesses: 42,
            elapsed_secs: 1.5,
            throughput: Some(Throughput {
                accesses_per_sec: 28,
                accesses_per_thread_per_sec: 28,
                cache_mb_per_sec: None,
            }),
        }
    }

    #[test]
    fn test_build_report_general() {
        let config = RunConfig::new(WorkloadConfig::default(), TargetConfig::new("/tmp/t"));
        let report = build_report(&config, 4096, &summary());
        assert_eq!(report.mode, "general");
        assert!(report.kernel_description.is_none());
        assert_eq!(report.target.mapped_size, 4096);
        assert!(report.generated_at.ends_with('Z'));
    }

    #[test]
    fn test_build_report_kernel() {
        let workload = WorkloadConfig {
            hiperf: 9,
            ..Default::default()
        };
        let config = RunConfig::new(workload, TargetConfig::new("/tmp/t"));
        let report = build_report(&config, 1 << 31, &summary());
        assert_eq!(report.mode, "kernel 9");
        assert_eq!(report.kernel_description.as_deref(), Some("random LD-incr-ST in 1st 2G"));
    }

    #[test]
    fn test_write_report_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let config = RunConfig::new(WorkloadConfig::default(), TargetConfig::new("/tmp/t"));
        let report = build_report(&config, 4096, &summary());
        write_json_report(&path, &report, true).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["total_accesses"], 42);
        assert_eq!(value["target"]["visibility"], "shared");
        assert!(value["summary"]["throughput"].get("cache_mb_per_sec").is_none());

        let parsed: JsonReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_write_report_bad_path() {
        let config = RunConfig::new(WorkloadConfig::default(), TargetConfig::new("/tmp/t"));
        let report = build_report(&config, 4096, &summary());
        assert!(write_json_report(Path::new("/nonexistent/dir/r.json"), &report, false).is_err());
    }
}
