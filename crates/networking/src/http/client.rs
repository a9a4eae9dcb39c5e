//! Points backend HTTP client with cookie-based authentication

use reqwest::{
    cookie::Jar,
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, RETRY_AFTER, USER_AGENT},
    Client, Response,
};

use adreward_core::{
    EarnRequest, EarnResponse, Error, PointsApi, ProblemDetails, Result, TokenGrant, TokenRequest,
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const BASE_URL: &str = "https://points.adreward.app";
// Longest retry hint honored; anything larger is treated as a day
const MAX_RETRY_AFTER_SECONDS: u64 = 24 * 60 * 60;
// Use a real browser User-Agent to avoid being blocked
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// HTTP client for the points token endpoints
///
/// Emulates browser requests by including the session cookie in all
/// authenticated requests. One client serves any number of ad slots; the
/// token values themselves never live here.
pub struct PointsClient {
    http: Client,
    session_token: String,
    base_url: String,
}

impl PointsClient {
    /// Create a new client with the given session token
    ///
    /// # Arguments
    /// * `session_token` - The `__Secure-auth.session_token` cookie value
    pub fn new(session_token: &str) -> Self {
        Self::with_base_url(session_token, BASE_URL)
    }

    /// Create a client against a non-default backend (staging, tests)
    pub fn with_base_url(session_token: &str, base_url: &str) -> Self {
        let jar = Arc::new(Jar::default());
        if let Ok(url) = base_url.parse() {
            jar.add_cookie_str(
                &format!("__Secure-auth.session_token={}", session_token),
                &url,
            );
        }

        let http = Client::builder()
            .cookie_provider(jar)
            .user_agent(USER_AGENT_VALUE)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            session_token: session_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get default headers for requests (mimics browser)
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(referer) = HeaderValue::from_str(&format!("{}/", self.base_url)) {
            headers.insert(REFERER, referer);
        }

        // Session cookie
        if let Ok(cookie) = HeaderValue::from_str(&format!(
            "__Secure-auth.session_token={}",
            self.session_token
        )) {
            headers.insert(COOKIE, cookie);
        }

        headers
    }

    /// Issue a fresh single-use reward token for an ad slot
    #[instrument(skip(self))]
    pub async fn request_token(&self, ad_slot_id: &str) -> Result<TokenGrant> {
        let url = format!("{}/api/v1/points/token", self.base_url);

        debug!("Requesting reward token from: {}", url);

        let response = self
            .http
            .post(&url)
            .headers(self.default_headers())
            .json(&TokenRequest {
                ad_slot_id: ad_slot_id.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            error!("Token request failed: {}", err);
            return Err(err);
        }

        let grant: TokenGrant = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            Error::InvalidData(e.to_string())
        })?;

        debug!(
            "Token issued for slot {} ({} points earnable today)",
            ad_slot_id, grant.daily_remaining
        );
        Ok(grant)
    }

    /// Redeem a held token for points
    #[instrument(skip(self, token))]
    pub async fn redeem_token(&self, token: &str) -> Result<EarnResponse> {
        let url = format!("{}/api/v1/points/earn", self.base_url);

        debug!("Redeeming reward token at: {}", url);

        let response = self
            .http
            .post(&url)
            .headers(self.default_headers())
            .json(&EarnRequest {
                token: token.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            error!("Redemption failed: {}", err);
            return Err(err);
        }

        let earned: EarnResponse = response.json().await.map_err(|e| {
            error!("Failed to parse earn response: {}", e);
            Error::InvalidData(e.to_string())
        })?;

        debug!(
            "Redeemed {} points ({} remaining today)",
            earned.earned, earned.daily_remaining
        );
        Ok(earned)
    }
}

impl PointsApi for PointsClient {
    async fn request_token(&self, ad_slot_id: &str) -> Result<TokenGrant> {
        PointsClient::request_token(self, ad_slot_id).await
    }

    async fn redeem_token(&self, token: &str) -> Result<EarnResponse> {
        PointsClient::redeem_token(self, token).await
    }
}

/// Map a non-success response to an error, draining its problem body
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let header_retry_after = retry_after_from_headers(response.headers());
    let problem: ProblemDetails = response.json().await.unwrap_or_default();

    match status.as_u16() {
        401 => Error::SessionExpired,
        403 => Error::VerificationRequired(
            problem
                .message()
                .unwrap_or("Security verification required")
                .to_string(),
        ),
        429 => Error::RateLimited {
            // Header takes precedence over the body hint
            retry_after_seconds: header_retry_after
                .or(problem.retry_after_seconds)
                .map(|seconds| seconds.min(MAX_RETRY_AFTER_SECONDS)),
            detail: problem
                .message()
                .unwrap_or("Too many requests")
                .to_string(),
        },
        _ => Error::ApiError(
            problem
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status)),
        ),
    }
}

/// Parse a `Retry-After` header given in whole seconds
fn retry_after_from_headers(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited_response(retry_after: Option<&str>, body: &str) -> Response {
        let mut builder = http::Response::builder().status(429);
        if let Some(value) = retry_after {
            builder = builder.header("Retry-After", value);
        }
        builder.body(body.to_string()).unwrap().into()
    }

    #[tokio::test]
    async fn header_retry_hint_wins_over_body() {
        let err = error_from_response(rate_limited_response(
            Some("30"),
            r#"{"status":429,"detail":"Slot cooldown active","retryAfterSeconds":3600}"#,
        ))
        .await;

        assert_eq!(err.retry_after_seconds(), Some(30));
        match err {
            Error::RateLimited { detail, .. } => assert_eq!(detail, "Slot cooldown active"),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn body_retry_hint_applies_without_header() {
        let err = error_from_response(rate_limited_response(
            None,
            r#"{"status":429,"detail":"Daily earn limit reached","retryAfterSeconds":3600}"#,
        ))
        .await;

        assert_eq!(err.retry_after_seconds(), Some(3600));
    }

    #[tokio::test]
    async fn absurd_retry_hints_are_clamped() {
        let err = error_from_response(rate_limited_response(
            Some("18446744073709551615"),
            "{}",
        ))
        .await;

        assert_eq!(err.retry_after_seconds(), Some(MAX_RETRY_AFTER_SECONDS));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("57"));
        assert_eq!(retry_after_from_headers(&headers), Some(57));
    }

    #[test]
    fn ignores_missing_or_date_retry_after() {
        let headers = HeaderMap::new();
        assert_eq!(retry_after_from_headers(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Fri, 29 Aug 2026 12:00:00 GMT"),
        );
        assert_eq!(retry_after_from_headers(&headers), None);
    }
}
