//! Token issuance models for the POST /api/v1/points/token endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for token issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub ad_slot_id: String,
}

/// A short-lived, single-use reward token issued by the server
///
/// Held in volatile memory only. The value is consumed exactly once by
/// redemption; the server rejects it afterwards regardless of client state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// Opaque token value
    pub token: String,
    /// Points still earnable today
    #[serde(default)]
    pub daily_remaining: u32,
    /// Absolute expiry instant, when the server reports one
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
