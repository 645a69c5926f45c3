//! Time points and the clock seam used by strands.
//!
//! [`Time`] is a nanosecond instant on a totally ordered axis. Where the axis
//! is anchored depends on the [`Clock`]: [`MonotonicClock`] anchors it at the
//! clock's creation and advances with wall time; [`VirtualClock`] advances
//! only when told to, which makes strand scheduling deterministic in tests.

use core::fmt;
use std::ops::Add;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A nanosecond instant on a clock's axis.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The zero instant (the clock's anchor).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a time from nanoseconds since the anchor.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a time from milliseconds since the anchor.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a time from seconds since the anchor.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since the anchor.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time as milliseconds since the anchor (truncated).
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Adds a duration in nanoseconds, saturating on overflow.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Returns the duration from `earlier` to `self`, zero if out of order.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add_nanos(u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000 {
            write!(
                f,
                "{}.{:03}s",
                self.0 / 1_000_000_000,
                (self.0 / 1_000_000) % 1000
            )
        } else if self.0 >= 1_000_000 {
            write!(f, "{}ms", self.0 / 1_000_000)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// The clock contract strands schedule against.
///
/// `now` is monotone non-decreasing; `sleep_until` returns no earlier than
/// the deadline on this clock's axis.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Time;

    /// Blocks the caller until `now() >= deadline`.
    fn sleep_until(&self, deadline: Time);
}

/// A shared clock handle.
pub type ClockHandle = Arc<dyn Clock>;

/// A monotonic wall clock anchored at its creation.
#[derive(Debug)]
pub struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }

    /// Creates a shared handle to a fresh monotonic clock.
    #[must_use]
    pub fn handle() -> ClockHandle {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        let elapsed = self.anchor.elapsed();
        Time::from_nanos(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }

    fn sleep_until(&self, deadline: Time) {
        loop {
            let now = self.now();
            if now >= deadline {
                return;
            }
            std::thread::sleep(deadline.duration_since(now));
        }
    }
}

/// A manually advanced clock for deterministic scheduling tests.
///
/// `sleep_until` advances the clock to the deadline instead of blocking, so
/// an immediate strand driven by a virtual clock executes its whole timeline
/// synchronously.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: Mutex<Time>,
}

impl VirtualClock {
    /// Creates a virtual clock at `Time::ZERO`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared handle to a fresh virtual clock.
    #[must_use]
    pub fn handle() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances the clock by `d`.
    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock();
        *now = *now + d;
    }

    /// Moves the clock forward to `t`; never moves it backward.
    pub fn advance_to(&self, t: Time) {
        let mut now = self.now.lock();
        if t > *now {
            *now = t;
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Time {
        *self.now.lock()
    }

    fn sleep_until(&self, deadline: Time) {
        self.advance_to(deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_conversions() {
        assert_eq!(Time::from_secs(1).as_nanos(), 1_000_000_000);
        assert_eq!(Time::from_millis(1).as_nanos(), 1_000_000);
        assert_eq!(Time::from_nanos(1_500_000_000).as_millis(), 1500);
    }

    #[test]
    fn time_is_additive_over_durations() {
        let t = Time::from_millis(10) + Duration::from_millis(5);
        assert_eq!(t, Time::from_millis(15));
        assert!(Time::from_millis(10) < t);
    }

    #[test]
    fn monotonic_clock_does_not_go_backward() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn virtual_clock_advances_on_sleep() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Time::ZERO);
        clock.sleep_until(Time::from_millis(25));
        assert_eq!(clock.now(), Time::from_millis(25));

        // sleeping toward the past is a no-op
        clock.sleep_until(Time::from_millis(5));
        assert_eq!(clock.now(), Time::from_millis(25));
    }

    #[test]
    fn virtual_clock_advance_accumulates() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(10));
        clock.advance(Duration::from_millis(15));
        assert_eq!(clock.now(), Time::from_millis(25));
    }
}
