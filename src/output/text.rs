//! Human-readable text output

use crate::stats::RunSummary;
use crate::util::time::format_rate;
use std::fmt::Write;

/// Print the run summary to stdout
///
/// With `per_thread` set, each thread's count is listed before the totals.
pub fn print_summary(summary: &RunSummary, per_thread: bool) {
    print!("{}", render_summary(summary, per_thread));
}

/// Render the run summary as printed by [`print_summary`]
pub fn render_summary(summary: &RunSummary, per_thread: bool) -> String {
    let mut out = String::new();

    if per_thread {
        for thread in &summary.threads {
            let _ = writeln!(
                out,
                "Thread {:4}: {:>22} accesses (CPU {})",
                thread.index,
                format_number(thread.accesses),
                thread.cpu
            );
        }
    }

    let _ = writeln!(
        out,
        "{:>20} accesses across {} threads in {:.2} seconds",
        format_number(summary.total_accesses),
        summary.thread_count(),
        summary.elapsed_secs
    );

    if let Some(rates) = summary.throughput {
        let _ = writeln!(
            out,
            "{:>20} accesses/second ({})",
            format_number(rates.accesses_per_sec),
            format_rate(rates.accesses_per_sec as f64)
        );
        let _ = writeln!(
            out,
            "{:>20} accesses/thread/second",
            format_number(rates.accesses_per_thread_per_sec)
        );
        if let Some(mb) = rates.cache_mb_per_sec {
            let _ = writeln!(out, "{:>20} MB/sec cache traffic", mb);
        }
    }

    out
}

/// Format number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let mut count = 0;

    for c in s.chars().rev() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
        count += 1;
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ThreadCount, Throughput};

    fn summary(throughput: Option<Throughput>) -> RunSummary {
        RunSummary {
            threads: vec![
                ThreadCount {
                    index: 0,
                    cpu: 0,
                    accesses: 1_000_000,
                },
                ThreadCount {
                    index: 1,
                    cpu: 2,
                    accesses: 234_567,
                },
            ],
            total_accesses: 1_234_567,
            elapsed_secs: 2.0,
            throughput,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_render_totals_only() {
        let text = render_summary(&summary(None), false);
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("1,234,567 accesses across 2 threads in 2.00 seconds"));
    }

    #[test]
    fn test_render_with_rates() {
        let text = render_summary(
            &summary(Some(Throughput {
                accesses_per_sec: 617_283,
                accesses_per_thread_per_sec: 308_641,
                cache_mb_per_sec: Some(37),
            })),
            true,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Thread    0:"));
        assert!(lines[3].contains("617,283 accesses/second (617.28K)"));
        assert!(lines[4].contains("308,641 accesses/thread/second"));
        assert!(lines[5].contains("37 MB/sec cache traffic"));
    }
}
