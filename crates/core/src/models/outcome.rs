//! Outbound reward notification for the embedding UI

use serde::Serialize;

/// Result of one ad click-out, reported to the embedding UI
///
/// Pass-through notification only; persistence already happened (or failed)
/// server-side by the time this is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RewardOutcome {
    /// The click-out was redeemed and points were credited
    Earned { earned: u32 },
    /// The click-out produced no reward
    Failed { error: Option<String> },
}

impl RewardOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RewardOutcome::Earned { .. })
    }
}
