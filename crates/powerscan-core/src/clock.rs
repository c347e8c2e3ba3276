//! Scan clock: microseconds since an arbitrary epoch, monotonic within a run.

use std::sync::OnceLock;
use std::time::Instant;

/// Microseconds since the process clock epoch.
pub type ClockTime = i64;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Current monotonic clock in microseconds. The epoch is fixed on first use,
/// so values are comparable for the lifetime of the process.
pub fn monotonic_micros() -> ClockTime {
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as ClockTime
}

/// Convert a driver timestamp in nanoseconds to the scan clock resolution.
pub fn ns_to_micros(time_ns: i64) -> ClockTime {
    time_ns / 1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = monotonic_micros();
        let b = monotonic_micros();
        assert!(b >= a);
        assert!(a >= 0);
    }

    #[test]
    fn test_ns_to_micros() {
        assert_eq!(ns_to_micros(1_500_000), 1_500);
        assert_eq!(ns_to_micros(999), 0);
        assert_eq!(ns_to_micros(-2_000), -2);
    }
}
