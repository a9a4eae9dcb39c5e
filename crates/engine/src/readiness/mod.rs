//! Ad readiness tracking for one slot container
//!
//! The embedding layer owns the actual DOM observation (script load state,
//! mutation watching for an iframe) and forwards facts; this probe reduces
//! them to a tri-state readiness with a bounded load timeout.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Readiness of the ad iframe inside the slot container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdReadiness {
    /// Still waiting for the script and/or an iframe
    Pending,
    /// An iframe is present; reward mechanics may run
    Ready,
    /// Script failed or no iframe appeared in time; reward mechanics are off
    Blocked,
}

/// Tracks one container's readiness
#[derive(Debug)]
pub struct ReadinessProbe {
    state: AdReadiness,
    deadline: Option<Instant>,
}

impl ReadinessProbe {
    pub fn new() -> Self {
        Self {
            state: AdReadiness::Pending,
            deadline: None,
        }
    }

    pub fn state(&self) -> AdReadiness {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == AdReadiness::Ready
    }

    pub fn is_blocked(&self) -> bool {
        self.state == AdReadiness::Blocked
    }

    /// Deadline for an iframe to appear, while still pending
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The ad-network script finished loading; start the iframe wait
    pub fn script_loaded(&mut self, load_timeout: Duration) {
        if self.state == AdReadiness::Pending && self.deadline.is_none() {
            self.deadline = Some(Instant::now() + load_timeout);
        }
    }

    /// The ad-network script failed; the slot is blocked from here on
    pub fn script_failed(&mut self) {
        self.state = AdReadiness::Blocked;
        self.deadline = None;
    }

    /// An iframe is present in the container (found immediately or observed)
    pub fn iframe_detected(&mut self) {
        if self.state == AdReadiness::Pending {
            self.state = AdReadiness::Ready;
            self.deadline = None;
        }
    }

    /// Mark blocked if the load deadline passed with no iframe
    pub fn expire_if_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.state == AdReadiness::Pending && Instant::now() >= deadline => {
                self.state = AdReadiness::Blocked;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn script_failure_blocks_immediately() {
        let mut probe = ReadinessProbe::new();
        probe.script_failed();
        assert!(probe.is_blocked());
        assert_eq!(probe.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn iframe_already_present_reports_ready_without_waiting() {
        let mut probe = ReadinessProbe::new();
        probe.iframe_detected();
        assert!(probe.is_ready());

        // Remount: repeated reports stay ready
        probe.iframe_detected();
        assert!(probe.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_when_no_iframe_before_timeout() {
        let mut probe = ReadinessProbe::new();
        probe.script_loaded(Duration::from_secs(10));
        assert_eq!(probe.state(), AdReadiness::Pending);

        advance(Duration::from_secs(9)).await;
        assert!(!probe.expire_if_due());

        advance(Duration::from_secs(1)).await;
        assert!(probe.expire_if_due());
        assert!(probe.is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn iframe_within_timeout_reports_ready() {
        let mut probe = ReadinessProbe::new();
        probe.script_loaded(Duration::from_secs(10));

        advance(Duration::from_secs(3)).await;
        probe.iframe_detected();
        assert!(probe.is_ready());

        // Deadline is gone; nothing left to expire
        advance(Duration::from_secs(60)).await;
        assert!(!probe.expire_if_due());
        assert!(probe.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn script_failure_overrides_ready() {
        let mut probe = ReadinessProbe::new();
        probe.iframe_detected();
        assert!(probe.is_ready());

        probe.script_failed();
        assert!(probe.is_blocked());

        // Blocked is terminal
        probe.iframe_detected();
        assert!(probe.is_blocked());
    }
}
