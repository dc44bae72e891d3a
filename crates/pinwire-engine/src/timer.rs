use std::time::{Duration, Instant};

/// Smallest accepted reporting interval.
pub const MIN_SAMPLING_INTERVAL: Duration = Duration::from_millis(1);

/// Default reporting interval.
pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(19);

/// Decides which loop iterations are reporting iterations.
///
/// The deadline advances by whole intervals so the cadence does not drift
/// with loop jitter. A loop that falls more than one interval behind skips
/// ahead instead of reporting in a burst.
#[derive(Debug, Clone)]
pub struct ReportTimer {
    interval: Duration,
    last: Instant,
}

impl ReportTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval: interval.max(MIN_SAMPLING_INTERVAL),
            last: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the interval; values below [`MIN_SAMPLING_INTERVAL`] are raised
    /// to it. Returns the interval in effect.
    pub fn set_interval(&mut self, interval: Duration) -> Duration {
        self.interval = interval.max(MIN_SAMPLING_INTERVAL);
        self.interval
    }

    /// Whether a reporting interval has elapsed at `now`.
    pub fn check(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.interval {
            return false;
        }
        self.last += self.interval;
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
        }
        true
    }

    /// Start a fresh interval at `now`.
    pub fn restart(&mut self, now: Instant) {
        self.last = now;
    }
}
