/*! Time structures.

The `time` module contains structures used to represent both
absolute and relative time.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represet relative time.
 - [Interval] is a periodic deadline polled from the main loop.

[Instant]: struct.Instant.html
[Duration]: struct.Duration.html
[Interval]: struct.Interval.html
*/
use core::{fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that
/// represents a number of milliseconds, monotonically increasing
/// since an arbitrary moment in time, such as system startup.
///
/// * A value of `0` is inherently arbitrary.
/// * A value less than `0` indicates a time before the starting
///   point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    pub millis: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The fractional number of milliseconds that have passed
    /// since the beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the
    /// beginning of time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since
    /// the biginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }

    /// The time elapsed since an earlier instant.
    ///
    /// Zero if `earlier` is in fact later than `self`, the clock is assumed monotonic.
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        let diff = self.millis.saturating_sub(earlier.millis);
        Duration::from_millis(if diff > 0 { diff as u64 } else { 0 })
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.as_millis() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.as_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        self.duration_since(rhs)
    }
}

/// A periodic deadline.
///
/// Expires once per `period`. Missed periods are not made up for, the next deadline is always
/// scheduled relative to the moment the expiry was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    next: Instant,
    period: Duration,
}

impl Interval {
    /// An interval whose first deadline is one `period` after `start`.
    pub fn new(start: Instant, period: Duration) -> Self {
        Interval { next: start + period, period }
    }

    /// Restart the interval at `start`.
    pub fn reset(&mut self, start: Instant) {
        self.next = start + self.period;
    }

    /// Check for expiry and schedule the next deadline if it occurred.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }

        self.next = now + self.period;
        true
    }

    /// The next deadline.
    pub fn deadline(&self) -> Instant {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_ops() {
        // std::ops::Add
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        // std::ops::Sub
        assert_eq!(Instant::from_millis(7) - Duration::from_millis(5), Instant::from_millis(2));
        assert_eq!(Instant::from_secs(3) - Instant::from_secs(1), Duration::from_secs(2));
        assert_eq!(Instant::from_secs(1) - Instant::from_secs(3), Duration::from_secs(0));
    }

    #[test]
    fn test_instant_getters() {
        let instant = Instant::from_millis(5674);
        assert_eq!(instant.secs(), 5);
        assert_eq!(instant.millis(), 674);
        assert_eq!(instant.total_millis(), 5674);
    }

    #[test]
    fn test_instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Instant::from_millis(5005)), "5.005s");
    }

    #[test]
    fn test_interval() {
        let mut interval = Interval::new(Instant::from_secs(0), Duration::from_secs(10));
        assert!(!interval.poll(Instant::from_secs(9)));
        assert!(interval.poll(Instant::from_secs(10)));
        assert!(!interval.poll(Instant::from_secs(19)));
        // Late observation postpones the following deadline.
        assert!(interval.poll(Instant::from_secs(25)));
        assert_eq!(interval.deadline(), Instant::from_secs(35));
    }
}
