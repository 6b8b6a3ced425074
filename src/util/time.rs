//! Monotonic timing utilities
//!
//! Run start and stop are taken from the monotonic clock; only seeds and
//! report timestamps use wall-clock time.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic timestamp marking the start or stop of a run
///
/// This is a thin wrapper around `std::time::Instant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    instant: Instant,
}

impl Timestamp {
    /// Create a new timestamp representing the current time
    #[inline]
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
        }
    }

    /// Get the elapsed time since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Get the duration between this timestamp and an earlier one
    ///
    /// Saturates to zero if `earlier` is actually later.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.instant.saturating_duration_since(earlier.instant)
    }

    /// Timestamp shifted forward, used to build fixed intervals in tests
    pub fn add(&self, duration: Duration) -> Timestamp {
        Self {
            instant: self.instant + duration,
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

/// Whole seconds since the Unix epoch (0 if the clock is before it)
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Format a rate (operations per second)
///
/// # Examples
///
/// ```
/// use maptrap::util::time::format_rate;
///
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else if rate < 1_000_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else {
        format!("{:.2}G", rate / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timestamp_elapsed() {
        let start = Timestamp::now();
        thread::sleep(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_timestamp_duration_since() {
        let t1 = Timestamp::now();
        thread::sleep(Duration::from_millis(10));
        let t2 = Timestamp::now();

        assert!(t2.duration_since(t1) >= Duration::from_millis(10));
        assert_eq!(t1.duration_since(t2), Duration::ZERO);
    }

    #[test]
    fn test_timestamp_add() {
        let t1 = Timestamp::now();
        let t2 = t1.add(Duration::from_secs(2));
        assert_eq!(t2.duration_since(t1), Duration::from_secs(2));
    }

    #[test]
    fn test_unix_seconds() {
        // 2020-01-01
        assert!(unix_seconds() > 1_577_836_800);
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(500.0), "500");
        assert_eq!(format_rate(1500.0), "1.50K");
        assert_eq!(format_rate(1_500_000.0), "1.50M");
        assert_eq!(format_rate(1_500_000_000.0), "1.50G");
    }
}
