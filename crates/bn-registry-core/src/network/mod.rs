//! Network access: GitHub API, URL verification and the shared HTTP plumbing.
//!
//! - Rate-limit-aware HTTP client
//! - Retry with backoff
//! - `SourceHost` seam and its GitHub implementation
//! - `LinkChecker` seam and its HEAD-request implementation

mod client;
mod github;
mod retry;
mod source_host;
mod url_check;

pub use client::{extract_domain, HttpClient, RateLimitState};
pub use github::GitHubClient;
pub use retry::{retry_async, RetryConfig, RetryStats};
pub use source_host::SourceHost;
pub use url_check::{check_urls, HttpLinkChecker, LinkChecker, UrlCheckResult};
