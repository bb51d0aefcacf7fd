//! HTTP client that tracks GitHub rate limits.
//!
//! Every request carries the registry user agent. API requests additionally
//! send the GitHub media type and, when configured, a bearer token. Rate limit
//! headers from each response are kept in atomics so callers can report the
//! remaining quota after a batch.

use crate::config::NetworkConfig;
use crate::error::{RegistryError, Result};
use chrono::Utc;
use reqwest::{header, Client, Response, StatusCode};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// Unix timestamp when the window resets.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// True once fewer than 10% of requests remain.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => remaining < (limit / 10).max(1),
            _ => false,
        }
    }

    /// True when the quota is used up.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn time_until_reset(&self) -> Option<Duration> {
        let now = u64::try_from(Utc::now().timestamp()).ok()?;
        self.reset
            .filter(|reset| *reset > now)
            .map(|reset| Duration::from_secs(reset - now))
    }
}

/// reqwest wrapper shared by the GitHub client and the URL checker.
pub struct HttpClient {
    client: Client,
    token: Option<String>,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
    throttle_delay: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| RegistryError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            token: None,
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
            throttle_delay: Duration::from_millis(500),
        })
    }

    /// Authenticate API requests with a bearer token. Blank tokens are ignored.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        let reset = self.rate_limit_reset.load(Ordering::SeqCst);
        RateLimitState {
            remaining: u64::try_from(remaining).ok(),
            limit: (limit > 0).then_some(limit),
            reset: (reset > 0).then_some(reset),
        }
    }

    /// GET a GitHub API resource.
    ///
    /// Non-success statuses other than 429 are returned to the caller.
    pub async fn get_api(&self, url: &str) -> Result<Response> {
        self.maybe_throttle().await;

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, NetworkConfig::GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| request_error("GET", url, e))?;

        self.update_rate_limits(&response);
        check_response_status(response, url)
    }

    /// HEAD an arbitrary URL with a per-request timeout.
    pub async fn head(&self, url: &str, timeout: Duration) -> Result<Response> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_error("HEAD", url, e))?;

        check_response_status(response, url)
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if state.should_throttle() {
            warn!(
                "Rate limit approaching (remaining: {:?}/{:?}), throttling for {:?}",
                state.remaining, state.limit, self.throttle_delay
            );
            tokio::time::sleep(self.throttle_delay).await;
        }
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();

        if let Some(remaining) = header_number::<i64>(headers, "X-RateLimit-Remaining") {
            self.rate_limit_remaining.store(remaining, Ordering::SeqCst);
        }
        if let Some(limit) = header_number::<u64>(headers, "X-RateLimit-Limit") {
            self.rate_limit_limit.store(limit, Ordering::SeqCst);
        }
        if let Some(reset) = header_number::<u64>(headers, "X-RateLimit-Reset") {
            self.rate_limit_reset.store(reset, Ordering::SeqCst);
        }

        let state = self.rate_limit_state();
        if let (Some(remaining), Some(limit)) = (state.remaining, state.limit) {
            debug!("Rate limit: {}/{}", remaining, limit);
        }
    }
}

fn header_number<T: std::str::FromStr>(headers: &header::HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn request_error(method: &str, url: &str, err: reqwest::Error) -> RegistryError {
    if err.is_timeout() {
        debug!("{} {} timed out", method, url);
        return RegistryError::from(err);
    }
    RegistryError::Network {
        message: format!("{} {} failed: {}", method, url, err),
        source: Some(err),
    }
}

fn check_response_status(response: Response, url: &str) -> Result<Response> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    Err(RegistryError::RateLimited {
        service: extract_domain(url),
        retry_after_secs: retry_after,
    })
}

/// Host part of a URL, `unknown` if it does not parse.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
