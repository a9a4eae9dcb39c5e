//! Problem-details error body returned by the points endpoints

use serde::{Deserialize, Serialize};

/// RFC 7807-style error body
///
/// The server attaches a `Retry-After` header to 429 responses; some error
/// bodies additionally carry `retryAfterSeconds`. The header wins when both
/// are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    /// Machine-readable error code (e.g. "turnstile-required")
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub retry_after_seconds: Option<u64>,
}

impl ProblemDetails {
    /// Best human-readable message for display
    pub fn message(&self) -> Option<&str> {
        self.detail.as_deref().or(self.title.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_limit_body() {
        let json = r#"{
            "status": 429,
            "detail": "Daily earn limit reached",
            "retryAfterSeconds": 3600
        }"#;
        let problem: ProblemDetails = serde_json::from_str(json).unwrap();
        assert_eq!(problem.status, Some(429));
        assert_eq!(problem.retry_after_seconds, Some(3600));
        assert_eq!(problem.message(), Some("Daily earn limit reached"));
    }

    #[test]
    fn tolerates_empty_body() {
        let problem: ProblemDetails = serde_json::from_str("{}").unwrap();
        assert_eq!(problem.status, None);
        assert_eq!(problem.message(), None);
    }
}
