use std::time::{Duration, Instant};

/// Deadline-driven tick source.
///
/// Each deadline is the previous one plus `interval`, so time spent handling
/// other events does not stretch the cadence. A loop that falls behind by more
/// than a whole interval gets one coalesced tick, never a burst.
#[derive(Debug, Clone)]
pub struct SessionClock {
    interval: Duration,
    next_deadline: Instant,
    paused: bool,
}

impl SessionClock {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_deadline: now + interval,
            paused: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// How long until the next tick is due. `None` while paused.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        if self.paused {
            None
        } else {
            Some(self.next_deadline.saturating_duration_since(now))
        }
    }

    /// Returns true when a tick is due at `now`; at most one per call.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.paused || now < self.next_deadline {
            return false;
        }

        self.next_deadline += self.interval;
        if now >= self.next_deadline {
            log::debug!(
                "clock fell behind by {:?}, coalescing missed ticks",
                now - self.next_deadline
            );
            self.next_deadline = now + self.interval;
        }
        true
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.reset(now);
    }

    /// Start a fresh interval at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.next_deadline = now + self.interval;
    }
}
