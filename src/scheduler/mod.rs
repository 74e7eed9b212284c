//! # Scheduler Module
//!
//! Fixed-period tick gate for the measurement loop.
//!
//! The scheduler never sleeps. Callers poll it as often as they like and it
//! reports a tick only once the minimum interval has elapsed since the last
//! one, which leaves the loop free for link housekeeping in between.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use tracing::debug;

/// Minimum-interval tick gate.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval_ms: u64,
    last_tick_ms: u64,
    ticks: u64,
}

impl Scheduler {
    /// Creates a scheduler whose first tick is due `interval_ms` after `start_ms`.
    ///
    /// An interval of zero is clamped to 1 ms.
    #[must_use]
    pub fn new(interval_ms: u64, start_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            last_tick_ms: start_ms,
            ticks: 0,
        }
    }

    /// Returns true, and starts a new period, when a tick is due at `now_ms`.
    ///
    /// A clock that stepped backwards (for example after a time resync)
    /// restarts the current period at `now_ms` instead of stalling until the
    /// old reference time comes around again.
    ///
    /// # Examples
    ///
    /// ```
    /// use current_node::scheduler::Scheduler;
    ///
    /// let mut scheduler = Scheduler::new(500, 0);
    /// assert!(!scheduler.due(300));
    /// assert!(scheduler.due(600));
    /// assert!(!scheduler.due(700));
    /// ```
    pub fn due(&mut self, now_ms: u64) -> bool {
        if now_ms < self.last_tick_ms {
            debug!(
                "Clock stepped back from {} to {} ms, restarting tick period",
                self.last_tick_ms, now_ms
            );
            self.last_tick_ms = now_ms;
            return false;
        }

        if now_ms - self.last_tick_ms >= self.interval_ms {
            self.last_tick_ms = now_ms;
            self.ticks += 1;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Ticks reported so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tick_before_interval() {
        let mut scheduler = Scheduler::new(500, 0);
        assert!(!scheduler.due(300));
        assert_eq!(scheduler.ticks(), 0);
    }

    #[test]
    fn test_exactly_one_tick_after_interval() {
        let mut scheduler = Scheduler::new(500, 0);
        assert!(!scheduler.due(300));
        assert!(scheduler.due(600));
        assert!(!scheduler.due(600));
        assert_eq!(scheduler.ticks(), 1);
    }

    #[test]
    fn test_period_restarts_at_actual_tick_time() {
        let mut scheduler = Scheduler::new(500, 0);
        assert!(scheduler.due(600));
        assert!(!scheduler.due(1000), "Next tick is due at 1100, not 1000");
        assert!(scheduler.due(1100));
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let mut scheduler = Scheduler::new(500, 1_000);
        assert!(!scheduler.due(1_499));
        assert!(scheduler.due(1_500));
    }

    #[test]
    fn test_backwards_clock_restarts_period() {
        let mut scheduler = Scheduler::new(500, 10_000);
        assert!(!scheduler.due(4_000));
        assert!(!scheduler.due(4_400));
        assert!(scheduler.due(4_500));
    }

    #[test]
    fn test_zero_interval_clamped() {
        let mut scheduler = Scheduler::new(0, 0);
        assert_eq!(scheduler.interval_ms(), 1);
        assert!(!scheduler.due(0));
        assert!(scheduler.due(1));
    }
}
