//! Cooldown window after a rate-limited token request
//!
//! Pure timer bookkeeping: a single "blocked until" instant with a derived
//! remaining-seconds value. The slot driver wakes once per second while a
//! window is active and clears it shortly after it elapses.

use std::time::Duration;

use tokio::time::Instant;

/// Extra second on top of the server's retry hint so we never retry early
const GRACE_SECONDS: u64 = 1;
/// Self-clear runs slightly after `until` so remaining has reached zero
const CLEAR_FUDGE: Duration = Duration::from_millis(50);
const TICK: Duration = Duration::from_secs(1);

/// A server-imposed wait before the next token request
#[derive(Debug, Default)]
pub struct Cooldown {
    until: Option<Instant>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self { until: None }
    }

    /// Start a window of `seconds`; zero clears instead
    pub fn start(&mut self, seconds: u64) {
        if seconds == 0 {
            self.until = None;
            return;
        }
        self.until = Some(Instant::now() + Duration::from_secs(seconds));
    }

    /// Start from a server-reported remaining duration, adding one grace second
    pub fn start_from_remaining(&mut self, seconds: u64) {
        self.start(seconds.saturating_add(GRACE_SECONDS));
    }

    /// Unconditionally remove the window
    pub fn clear(&mut self) {
        self.until = None;
    }

    pub fn is_active(&self) -> bool {
        self.until.is_some()
    }

    pub fn until(&self) -> Option<Instant> {
        self.until
    }

    /// Seconds left in the window: `max(0, ceil(until - now))`
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.until.map(|until| {
            let now = Instant::now();
            if until <= now {
                0
            } else {
                let millis = (until - now).as_millis();
                ((millis + 999) / 1000) as u64
            }
        })
    }

    /// Instant at which the window self-clears (`until` + fudge)
    pub fn clear_deadline(&self) -> Option<Instant> {
        self.until.map(|until| until + CLEAR_FUDGE)
    }

    /// Next instant the owner should re-derive state: the 1-second tick or
    /// the self-clear, whichever comes first
    pub fn next_wake(&self, now: Instant) -> Option<Instant> {
        self.clear_deadline()
            .map(|deadline| deadline.min(now + TICK))
    }

    /// Clear the window if its self-clear deadline has passed
    pub fn expire_if_due(&mut self) -> bool {
        match self.clear_deadline() {
            Some(deadline) if Instant::now() >= deadline => {
                self.until = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn counts_down_with_grace_second_then_self_clears() {
        let mut cooldown = Cooldown::new();
        cooldown.start_from_remaining(7);

        // 7 reported + 1 grace
        assert_eq!(cooldown.remaining_seconds(), Some(8));

        for expected in (0..8).rev() {
            advance(Duration::from_secs(1)).await;
            assert_eq!(cooldown.remaining_seconds(), Some(expected));
        }

        // Zero but not yet past the fudge
        assert!(cooldown.is_active());
        assert!(!cooldown.expire_if_due());

        advance(CLEAR_FUDGE).await;
        assert!(cooldown.expire_if_due());
        assert!(!cooldown.is_active());
        assert_eq!(cooldown.remaining_seconds(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_seconds_clears() {
        let mut cooldown = Cooldown::new();
        cooldown.start(5);
        assert!(cooldown.is_active());
        cooldown.start(0);
        assert!(!cooldown.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_unconditional() {
        let mut cooldown = Cooldown::new();
        cooldown.start(60);
        cooldown.clear();
        assert!(!cooldown.is_active());
        assert_eq!(cooldown.next_wake(Instant::now()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn next_wake_is_tick_until_the_end() {
        let mut cooldown = Cooldown::new();
        cooldown.start(5);

        let now = Instant::now();
        assert_eq!(cooldown.next_wake(now), Some(now + TICK));

        advance(Duration::from_millis(4800)).await;
        let now = Instant::now();
        // Less than a tick left: the self-clear comes first
        assert_eq!(cooldown.next_wake(now), cooldown.clear_deadline());
    }
}
