//! Redemption models for the POST /api/v1/points/earn endpoint

use serde::{Deserialize, Serialize};

/// Request body for token redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnRequest {
    pub token: String,
}

/// Response from a successful redemption
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnResponse {
    /// Points credited for this click-out
    pub earned: u32,
    /// Points still earnable today
    #[serde(default)]
    pub daily_remaining: u32,
    /// Updated balance, when the server includes it
    #[serde(default)]
    pub balance: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_earn_response() {
        let json = r#"{ "earned": 5, "dailyRemaining": 40, "balance": 1205 }"#;
        let response: EarnResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.earned, 5);
        assert_eq!(response.daily_remaining, 40);
        assert_eq!(response.balance, Some(1205));
    }

    #[test]
    fn balance_is_optional() {
        let json = r#"{ "earned": 5, "dailyRemaining": 40 }"#;
        let response: EarnResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.balance, None);
    }
}
