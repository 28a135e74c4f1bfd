//! Timestamp sources
//!
//! The capture pipeline never reads a clock itself: callers pass the `when` of
//! every event. A [`Clock`] pairs the tick source with the unit that goes into
//! the stream header.

use std::time::Instant;

/// Monotonic tick source
pub trait Clock {
    /// Current tick count; never decreases
    fn now(&self) -> u64;

    /// Microseconds per tick
    fn timestamp_unit(&self) -> f64;
}

/// Nanosecond ticks since construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn timestamp_unit(&self) -> f64 {
        0.001
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_ticks_are_nanoseconds() {
        let clock = MonotonicClock::new();
        let before = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now() - before >= 2_000_000);
        assert!((clock.timestamp_unit() - 0.001).abs() < f64::EPSILON);
    }
}
