use std::time::Duration;

/// Fixed-interval progress poll. Owned by the capture session; cancelling is
/// dropping it, which the session does before any finalization step.
#[derive(Debug)]
pub struct ProgressPoll {
    interval: Duration,
    next_due: Duration,
}

impl ProgressPoll {
    pub fn start(now: Duration, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// Whether a poll is due at `now`. Ticks missed by a late caller collapse
    /// into a single poll.
    pub fn due(&mut self, now: Duration) -> bool {
        if now < self.next_due {
            return false;
        }
        while self.next_due <= now {
            self.next_due += self.interval;
        }
        true
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
