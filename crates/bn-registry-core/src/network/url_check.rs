//! HEAD-request reachability checks for download and icon URLs.
//!
//! Only 5xx responses are retried. A 4xx is a definitive answer, and a
//! transport error (DNS, TLS, refused connection) fails on the first attempt.

use crate::config::UrlCheckConfig;
use crate::error::{RegistryError, Result};
use crate::network::client::HttpClient;
use crate::network::retry::{retry_async, RetryConfig};
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of checking one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCheckResult {
    pub url: String,
    pub ok: bool,
    /// Final HTTP status, if a response arrived.
    pub status: Option<u16>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl UrlCheckResult {
    pub fn reachable(url: impl Into<String>, status: u16, attempts: u32) -> Self {
        Self {
            url: url.into(),
            ok: true,
            status: Some(status),
            error: None,
            attempts,
        }
    }

    pub fn unreachable(
        url: impl Into<String>,
        status: Option<u16>,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            url: url.into(),
            ok: false,
            status,
            error: Some(error.into()),
            attempts,
        }
    }

    /// Failure reason, or `None` when reachable.
    pub fn reason(&self) -> Option<String> {
        if self.ok {
            return None;
        }
        Some(match (self.status, &self.error) {
            (_, Some(error)) => error.clone(),
            (Some(status), None) => format!("HTTP {}", status),
            (None, None) => "unknown error".to_string(),
        })
    }

    /// Convert a failure into an error.
    pub fn into_result(self) -> Result<()> {
        match self.reason() {
            None => Ok(()),
            Some(reason) => Err(RegistryError::UrlUnreachable { url: self.url, reason }),
        }
    }
}

/// Verifies that URLs resolve.
#[async_trait]
pub trait LinkChecker: Send + Sync {
    async fn check(&self, url: &str) -> UrlCheckResult;
}

/// Check several URLs concurrently, preserving input order.
pub async fn check_urls(checker: &dyn LinkChecker, urls: &[String]) -> Vec<UrlCheckResult> {
    join_all(urls.iter().map(|url| checker.check(url))).await
}

/// One failed HEAD attempt.
#[derive(Debug)]
struct HeadFailure {
    status: Option<u16>,
    message: String,
}

impl HeadFailure {
    fn is_server_error(&self) -> bool {
        self.status.is_some_and(|s| s >= 500)
    }
}

impl fmt::Display for HeadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// [`LinkChecker`] that issues real HEAD requests.
pub struct HttpLinkChecker {
    http: HttpClient,
    retry: RetryConfig,
    timeout: Duration,
}

impl HttpLinkChecker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpClient::with_timeout(UrlCheckConfig::TIMEOUT)?,
            retry: RetryConfig::fixed(UrlCheckConfig::ATTEMPTS, UrlCheckConfig::RETRY_DELAY),
            timeout: UrlCheckConfig::TIMEOUT,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn head_once(&self, url: &str) -> std::result::Result<u16, HeadFailure> {
        match self.http.head(url, self.timeout).await {
            Ok(response) if response.status().is_success() => Ok(response.status().as_u16()),
            Ok(response) => {
                let status = response.status().as_u16();
                Err(HeadFailure {
                    status: Some(status),
                    message: format!("HTTP {}", status),
                })
            }
            Err(RegistryError::RateLimited { .. }) => Err(HeadFailure {
                status: Some(429),
                message: "HTTP 429".to_string(),
            }),
            Err(e) => Err(HeadFailure {
                status: None,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn check(&self, url: &str) -> UrlCheckResult {
        debug!("Checking URL {}", url);

        let (result, stats) = retry_async(
            &self.retry,
            || self.head_once(url),
            HeadFailure::is_server_error,
        )
        .await;

        match result {
            Ok(status) => UrlCheckResult::reachable(url, status, stats.attempts),
            Err(failure) => {
                warn!("URL check failed for {}: {}", url, failure);
                UrlCheckResult::unreachable(url, failure.status, failure.message, stats.attempts)
            }
        }
    }
}
