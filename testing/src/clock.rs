//! Deterministic clocks for tests.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use todo_coord_core::environment::Clock;

/// Fixed clock for deterministic tests.
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use todo_coord_testing::FixedClock;
/// use todo_coord_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now()); // Always the same!
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        test_clock()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Clock that advances by a fixed step on every read.
///
/// Useful for asserting that server-assigned timestamps move forward:
/// two reads are guaranteed distinct and ordered. Clones share the
/// underlying position.
#[derive(Debug, Clone)]
pub struct SteppingClock {
    current: Arc<Mutex<DateTime<Utc>>>,
    step: TimeDelta,
}

impl SteppingClock {
    /// Creates a clock starting at `start`, advancing by `step` per read.
    #[must_use]
    pub fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
            step,
        }
    }

    /// Creates a clock starting at the default test time, advancing one
    /// second per read.
    #[must_use]
    pub fn seconds() -> Self {
        Self::new(test_clock().time, TimeDelta::seconds(1))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        #[allow(clippy::unwrap_used)] // Test infrastructure; lock cannot poison
        let mut current = self.current.lock().unwrap();
        let now = *current;
        *current += self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_fixed() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn stepping_clock_moves_forward() {
        let clock = SteppingClock::seconds();
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, TimeDelta::seconds(1));
    }

    #[test]
    fn stepping_clock_clones_share_position() {
        let clock = SteppingClock::seconds();
        let other = clock.clone();
        let first = clock.now();
        let second = other.now();
        assert!(second > first);
    }
}
