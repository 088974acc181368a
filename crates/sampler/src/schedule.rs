//! Fixed-Increment Periodic Schedule

use crate::Clock;
use std::time::Duration;

/// Outcome of waiting for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTiming {
    /// The deadline was met (possibly after sleeping)
    OnTime,
    /// The tick started this much past its deadline, beyond the threshold
    Overrun { late_by: Duration },
}

/// Deadline accumulator for a fixed period.
///
/// Each deadline is the previous *target* plus the period, so a late tick
/// shortens the next wait instead of shifting every later tick.
#[derive(Debug, Clone)]
pub struct PeriodicSchedule {
    period: Duration,
    next_deadline: Duration,
    overrun_threshold: Duration,
}

impl PeriodicSchedule {
    /// Start a schedule whose first deadline is one period after `start`
    pub fn new(period: Duration, start: Duration, overrun_threshold: Duration) -> Self {
        Self {
            period,
            next_deadline: start + period,
            overrun_threshold,
        }
    }

    /// Period between ticks
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadline the next [`PeriodicSchedule::wait`] will target
    pub fn next_deadline(&self) -> Duration {
        self.next_deadline
    }

    /// Wait for the next deadline and advance the schedule by one period.
    ///
    /// Never skips a deadline: when behind, returns immediately and the
    /// following deadlines are still spaced by exactly one period.
    pub fn wait<C: Clock + ?Sized>(&mut self, clock: &C) -> TickTiming {
        let deadline = self.next_deadline;
        self.next_deadline += self.period;

        let now = clock.now();
        if now > deadline + self.overrun_threshold {
            return TickTiming::Overrun {
                late_by: now - deadline,
            };
        }
        if now < deadline {
            clock.sleep_until(deadline);
        }
        TickTiming::OnTime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    const PERIOD: Duration = Duration::from_micros(400);
    const THRESHOLD: Duration = Duration::from_micros(1000);

    #[test]
    fn test_sleeps_to_each_deadline() {
        let clock = ManualClock::new();
        let mut schedule = PeriodicSchedule::new(PERIOD, clock.now(), THRESHOLD);

        for n in 1..=5u32 {
            assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
            assert_eq!(clock.now(), PERIOD * n);
        }
    }

    #[test]
    fn test_late_tick_keeps_phase() {
        let clock = ManualClock::new();
        let mut schedule = PeriodicSchedule::new(PERIOD, clock.now(), THRESHOLD);

        schedule.wait(&clock);
        // Work for the second tick overran by 300us, within the threshold
        clock.advance(PERIOD + Duration::from_micros(300));
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(clock.now(), Duration::from_micros(1100));

        // The next deadline is still on the initial 400us grid
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(clock.now(), Duration::from_micros(1200));
    }

    #[test]
    fn test_overrun_reported_without_skipping() {
        let clock = ManualClock::new();
        let mut schedule = PeriodicSchedule::new(PERIOD, clock.now(), THRESHOLD);

        clock.advance(Duration::from_micros(2000));
        assert_eq!(
            schedule.wait(&clock),
            TickTiming::Overrun {
                late_by: Duration::from_micros(1600)
            }
        );
        // Catching up: each missed deadline is still visited, no sleeping
        assert_eq!(schedule.next_deadline(), Duration::from_micros(800));
        assert_eq!(
            schedule.wait(&clock),
            TickTiming::Overrun {
                late_by: Duration::from_micros(1200)
            }
        );
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(clock.now(), Duration::from_micros(2000));

        // Caught up: back to sleeping on the grid
        assert_eq!(schedule.wait(&clock), TickTiming::OnTime);
        assert_eq!(clock.now(), Duration::from_micros(2400));
    }
}
