//! Click-out detection state machine
//!
//! Correlates a pointer-down on the ad iframe with a focus transfer into it
//! (arming), then trusts a window-blur or page-hidden signal inside a short
//! confirmation window as evidence the user left the page through the ad.
//! A fallback path accepts a blur while the page is visible and the iframe
//! holds document focus, for browsers whose focus/blur ordering never
//! produces the armed path.
//!
//! The tolerances were tuned empirically; see `SlotConfig`.

use std::time::Duration;

use tokio::time::Instant;

/// How a click-out was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOut {
    /// Armed window consumed by a blur/hidden signal
    Confirmed,
    /// Blur-while-visible fallback outside an armed window
    BlurFallback,
}

/// Per-slot click-out detector: `idle -> armed -> confirmed`
///
/// At most one armed window is open at a time; arming replaces any prior
/// window. The caller owns the deadline: it polls `expire_if_due` (or wakes
/// at `armed_deadline`) to return to idle when a window lapses unconsumed.
#[derive(Debug)]
pub struct ClickOutDetector {
    pointer_focus_window: Duration,
    confirm_window: Duration,
    last_pointer_down: Option<Instant>,
    armed_until: Option<Instant>,
}

impl ClickOutDetector {
    pub fn new(pointer_focus_window: Duration, confirm_window: Duration) -> Self {
        Self {
            pointer_focus_window,
            confirm_window,
            last_pointer_down: None,
            armed_until: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed_until.is_some()
    }

    pub fn armed_deadline(&self) -> Option<Instant> {
        self.armed_until
    }

    /// A pointer-down landed on the slot's iframe
    pub fn on_pointer_down(&mut self) {
        self.last_pointer_down = Some(Instant::now());
    }

    /// Document focus moved into the slot's iframe; arms when the pointer
    /// down was recent enough. Returns whether an arm window opened.
    pub fn on_iframe_focus(&mut self) -> bool {
        let now = Instant::now();
        match self.last_pointer_down {
            Some(at) if now - at <= self.pointer_focus_window => {
                self.last_pointer_down = None;
                self.armed_until = Some(now + self.confirm_window);
                true
            }
            _ => false,
        }
    }

    /// The document became hidden
    pub fn on_visibility_hidden(&mut self) -> Option<ClickOut> {
        let armed_until = self.armed_until?;
        let now = Instant::now();
        self.disarm();
        if now <= armed_until {
            Some(ClickOut::Confirmed)
        } else {
            None
        }
    }

    /// The window lost focus. `iframe_focused` is whether the slot's iframe
    /// is the active element; `visible` is the document visibility at the
    /// time of the blur.
    pub fn on_window_blur(&mut self, iframe_focused: bool, visible: bool) -> Option<ClickOut> {
        if let Some(armed_until) = self.armed_until {
            let now = Instant::now();
            if now <= armed_until {
                if iframe_focused {
                    self.disarm();
                    return Some(ClickOut::Confirmed);
                }
                // Hidden may still follow inside the window
                return None;
            }
            self.disarm();
        }

        if visible && iframe_focused {
            Some(ClickOut::BlurFallback)
        } else {
            None
        }
    }

    /// Drop all arm state (explicit disarm, teardown, slot reset)
    pub fn disarm(&mut self) {
        self.last_pointer_down = None;
        self.armed_until = None;
    }

    /// Return to idle if the confirmation window lapsed unconsumed
    pub fn expire_if_due(&mut self) -> bool {
        match self.armed_until {
            Some(armed_until) if Instant::now() > armed_until => {
                self.disarm();
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

    fn detector() -> ClickOutDetector {
        ClickOutDetector::new(Duration::from_millis(200), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn arms_when_focus_follows_pointer_quickly() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(150)).await;
        assert!(det.on_iframe_focus());
        assert!(det.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn never_arms_when_focus_is_too_late() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(250)).await;
        assert!(!det.on_iframe_focus());
        assert!(!det.is_armed());

        // And nothing downstream can confirm
        assert_eq!(det.on_visibility_hidden(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn never_arms_without_pointer_down() {
        let mut det = detector();
        assert!(!det.on_iframe_focus());
        assert!(!det.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_inside_window_confirms_once() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(100)).await;
        assert!(det.on_iframe_focus());

        advance(Duration::from_millis(300)).await;
        assert_eq!(det.on_visibility_hidden(), Some(ClickOut::Confirmed));
        assert!(!det.is_armed());

        // Consumed; a trailing signal does nothing
        assert_eq!(det.on_visibility_hidden(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn blur_with_iframe_focus_inside_window_confirms() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(100)).await;
        assert!(det.on_iframe_focus());

        advance(Duration::from_millis(150)).await;
        assert_eq!(det.on_window_blur(true, true), Some(ClickOut::Confirmed));
        assert!(!det.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn blur_without_iframe_focus_keeps_window_open() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(100)).await;
        assert!(det.on_iframe_focus());

        assert_eq!(det.on_window_blur(false, true), None);
        assert!(det.is_armed());

        // The hidden signal can still land inside the window
        advance(Duration::from_millis(200)).await;
        assert_eq!(det.on_visibility_hidden(), Some(ClickOut::Confirmed));
    }

    #[tokio::test(start_paused = true)]
    async fn window_expires_back_to_idle() {
        let mut det = detector();
        det.on_pointer_down();
        advance(Duration::from_millis(100)).await;
        assert!(det.on_iframe_focus());

        advance(Duration::from_millis(600)).await;
        assert!(det.expire_if_due());
        assert!(!det.is_armed());
        assert_eq!(det.on_visibility_hidden(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_blur_while_visible_and_iframe_focused() {
        let mut det = detector();
        assert_eq!(det.on_window_blur(true, true), Some(ClickOut::BlurFallback));
        assert_eq!(det.on_window_blur(true, false), None);
        assert_eq!(det.on_window_blur(false, true), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_window() {
        let mut det = detector();
        det.on_pointer_down();
        assert!(det.on_iframe_focus());
        let first_deadline = det.armed_deadline().unwrap();

        advance(Duration::from_millis(400)).await;
        det.on_pointer_down();
        advance(Duration::from_millis(50)).await;
        assert!(det.on_iframe_focus());
        let second_deadline = det.armed_deadline().unwrap();
        assert!(second_deadline > first_deadline);

        // The original deadline passing no longer disarms
        advance(Duration::from_millis(100)).await;
        assert!(!det.expire_if_due());
        assert!(det.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_drops_all_state() {
        let mut det = detector();
        det.on_pointer_down();
        assert!(det.on_iframe_focus());
        det.disarm();
        assert!(!det.is_armed());
        assert_eq!(det.on_visibility_hidden(), None);
    }
}
