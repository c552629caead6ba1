//! Link time.
//!
//! The session never reads a clock itself; callers pass the current
//! [`LinkTime`] into every call. The runner derives it from a monotonic clock,
//! tests and the simulator step it by hand.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Microseconds since an arbitrary epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LinkTime(u64);

impl LinkTime {
    /// The epoch.
    pub const ZERO: LinkTime = LinkTime(0);

    /// Create from microseconds.
    pub const fn from_micros(us: u64) -> Self {
        LinkTime(us)
    }

    /// Create from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        LinkTime(ms * 1000)
    }

    /// Create from seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        LinkTime((secs * 1_000_000.0) as u64)
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    /// Seconds since the epoch.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: LinkTime) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for LinkTime {
    type Output = LinkTime;

    fn add(self, rhs: Duration) -> LinkTime {
        LinkTime(self.0.saturating_add(rhs.as_micros() as u64))
    }
}

impl Sub for LinkTime {
    type Output = Duration;

    fn sub(self, rhs: LinkTime) -> Duration {
        self.saturating_since(rhs)
    }
}

impl std::fmt::Display for LinkTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let t = LinkTime::from_millis(1500);
        assert_eq!(t.as_micros(), 1_500_000);
        assert_eq!(t.as_millis(), 1500);
        assert!((t.as_secs_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_arithmetic() {
        let t = LinkTime::from_millis(10) + Duration::from_millis(5);
        assert_eq!(t, LinkTime::from_millis(15));
        assert_eq!(t - LinkTime::from_millis(10), Duration::from_millis(5));
        assert_eq!(LinkTime::ZERO - t, Duration::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(LinkTime::from_millis(2250).to_string(), "2.250s");
    }
}
