//! Time sources that pace the scheduler lanes.
//!
//! Lanes never call `std::thread::sleep` directly; they ask a [`Clock`] to pause. The wall clock
//! sleeps in short slices so a cleared running flag is noticed promptly, and the manual clock
//! lets tests release pauses by advancing time explicitly.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep slice; bounds how late a shutdown is noticed.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Source of time used by periodic tasks.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Block for `interval`, returning early once `running` is cleared.
    fn pause(&self, interval: Duration, running: &AtomicBool);
}

/// Wall-clock time backed by [`Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn pause(&self, interval: Duration, running: &AtomicBool) {
        if interval.is_zero() {
            std::thread::yield_now();
            return;
        }
        let deadline = Instant::now() + interval;
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Deterministic clock advanced by hand.
///
/// A pause of `d` started at virtual time `t` returns once [`ManualClock::advance`] has moved the
/// clock to `t + d` or later. Waiters re-check the running flag periodically, so clearing it
/// releases them without advancing time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    tick: Condvar,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward and wake every paused lane whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
        self.tick.notify_all();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn pause(&self, interval: Duration, running: &AtomicBool) {
        let mut now = self.now.lock();
        let deadline = *now + interval;
        while *now < deadline && running.load(Ordering::Relaxed) {
            self.tick.wait_for(&mut now, SLEEP_SLICE);
        }
    }
}
