// Position ticker schedule
//
// Owned by the session control loop. A tick is due immediately after start,
// then one interval after the previous emission finished, so emissions never
// overlap and drift by their own execution time. Cancelling clears the
// deadline; since ticks and cancellation run on the same control thread, no
// tick can fire after a cancel has been acknowledged.

use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct PositionTicker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PositionTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes effect from the next reschedule
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Activate with a tick due right away; false if already active
    pub fn start(&mut self, now: Instant) -> bool {
        if self.next_due.is_some() {
            return false;
        }
        self.next_due = Some(now);
        true
    }

    /// Deactivate; returns whether it was active
    pub fn cancel(&mut self) -> bool {
        self.next_due.take().is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next_due, Some(due) if now >= due)
    }

    /// Time left until the next tick, `None` when inactive
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Schedule the following tick; no-op once cancelled
    pub fn reschedule(&mut self, now: Instant) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval);
        }
    }
}

impl Default for PositionTicker {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
