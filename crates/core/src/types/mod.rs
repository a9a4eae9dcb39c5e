//! Shared type definitions and per-slot configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier of one ad placement instance (for clarity in signatures)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdSlotId(pub String);

impl AdSlotId {
    pub fn new(id: impl Into<String>) -> Self {
        AdSlotId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AdSlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timing knobs for one ad slot
///
/// The windows were tuned empirically against real ad-network iframes;
/// widening them trades false negatives for false positives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotConfig {
    /// How long to wait for an iframe to appear before marking the ad blocked
    pub load_timeout: Duration,
    /// How long a click-out signal is trusted after arming
    pub confirm_window: Duration,
    /// Maximum pointer-down to iframe-focus gap that still arms
    pub pointer_focus_window: Duration,
    /// How far before token expiry a proactive reissue is scheduled
    pub token_refresh_margin: Duration,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(10),
            confirm_window: Duration::from_millis(500),
            pointer_focus_window: Duration::from_millis(200),
            token_refresh_margin: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows() {
        let config = SlotConfig::default();
        assert_eq!(config.load_timeout, Duration::from_secs(10));
        assert_eq!(config.confirm_window, Duration::from_millis(500));
        assert_eq!(config.pointer_focus_window, Duration::from_millis(200));
        assert_eq!(config.token_refresh_margin, Duration::from_secs(5));
    }
}
