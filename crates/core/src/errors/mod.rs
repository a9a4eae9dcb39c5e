//! Error types and Result alias for the rewarded-ad subsystem

use thiserror::Error;

/// Main error type for the rewarded-ad subsystem
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Verification required: {0}")]
    VerificationRequired(String),

    #[error("Rate limited: {detail}")]
    RateLimited {
        /// Seconds until a retry may succeed, when the server said so
        retry_after_seconds: Option<u64>,
        detail: String,
    },

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Retry delay carried by a rate-limit error, if any
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Error::RateLimited {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_only_on_rate_limit() {
        let err = Error::RateLimited {
            retry_after_seconds: Some(42),
            detail: "slot cooldown".to_string(),
        };
        assert_eq!(err.retry_after_seconds(), Some(42));
        assert!(err.is_rate_limited());

        let err = Error::ApiError("boom".to_string());
        assert_eq!(err.retry_after_seconds(), None);
        assert!(!err.is_rate_limited());
    }
}
