//! Clock Abstraction
//!
//! The sampler never reads wall time directly so the schedule can be driven by
//! a deterministic clock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source with a blocking wait
pub trait Clock: Send {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`
    fn sleep_until(&self, deadline: Duration);

    /// Milliseconds since origin, truncated to the reading timestamp width
    fn millis(&self) -> u32 {
        self.now().as_millis() as u32
    }
}

/// Real clock: sleeps the thread, then spins for the last stretch
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    spin_margin: Duration,
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new(spin_margin: Duration) -> Self {
        Self {
            origin: Instant::now(),
            spin_margin,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new(Duration::from_micros(20))
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        loop {
            let now = self.now();
            if now >= deadline {
                return;
            }
            let remaining = deadline - now;
            if remaining > self.spin_margin {
                std::thread::sleep(remaining - self.spin_margin);
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

/// Deterministic clock for tests.
///
/// Time only moves through [`ManualClock::advance`] or by sleeping. Clones
/// share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time (never backwards)
    pub fn set(&self, to: Duration) {
        self.nanos.fetch_max(to.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep_until(&self, deadline: Duration) {
        self.set(deadline);
    }
}
