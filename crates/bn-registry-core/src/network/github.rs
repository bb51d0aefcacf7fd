//! GitHub REST API client.
//!
//! Read-only access to repository metadata, trees, file contents, tags and
//! commits. Transient failures (network errors, timeouts, 5xx) are retried
//! with exponential backoff; everything else surfaces immediately.

use crate::config::NetworkConfig;
use crate::error::{RegistryError, Result};
use crate::github_url::RepoCoordinate;
use crate::models::{GitHubCommit, GitHubContent, GitHubRepo, GitHubTag, GitHubTree};
use crate::network::client::{HttpClient, RateLimitState};
use crate::network::retry::{retry_async, RetryConfig};
use crate::network::source_host::SourceHost;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub struct GitHubClient {
    http: Arc<HttpClient>,
    api_base: Url,
    retry: RetryConfig,
}

impl GitHubClient {
    /// Client for api.github.com, authenticated when `token` is set.
    pub fn new(token: Option<String>) -> Result<Self> {
        let http = HttpClient::new()?.with_token(token);
        Self::with_http(Arc::new(http), NetworkConfig::GITHUB_API_BASE)
    }

    /// Client against a custom API root, e.g. a GitHub Enterprise host.
    pub fn with_http(http: Arc<HttpClient>, api_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| RegistryError::Other(format!("Invalid API base {}: {}", api_base, e)))?;

        Ok(Self {
            http,
            api_base,
            retry: RetryConfig::new()
                .with_max_attempts(NetworkConfig::API_MAX_ATTEMPTS)
                .with_base_delay(NetworkConfig::API_RETRY_BASE_DELAY),
        })
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        self.http.rate_limit_state()
    }

    /// Build an API URL from raw path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Other(format!("API base cannot be a base URL: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments.iter().filter(|s| !s.is_empty()));

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let url = url.to_string();
        debug!("GitHub API GET {}", url);

        let (result, stats) = retry_async(
            &self.retry,
            || {
                let http = self.http.clone();
                let url = url.clone();
                async move {
                    let response = http.get_api(&url).await?;
                    classify_status(&http, response, &url)
                }
            },
            |e: &RegistryError| e.is_retryable(),
        )
        .await;

        if stats.attempts > 1 {
            debug!("GitHub API request took {} attempts", stats.attempts);
        }

        let response = result?;
        response.json::<T>().await.map_err(|e| RegistryError::Json {
            message: format!("Failed to parse GitHub response from {}: {}", url, e),
            source: None,
        })
    }
}

/// Map a non-success API status to an error, keeping the response otherwise.
fn classify_status(
    http: &HttpClient,
    response: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::FORBIDDEN && http.rate_limit_state().is_exhausted() {
        return Err(RegistryError::RateLimited {
            service: "GitHub".to_string(),
            retry_after_secs: http.rate_limit_state().time_until_reset().map(|d| d.as_secs()),
        });
    }

    let message = if status == StatusCode::NOT_FOUND {
        format!("Not found: {}", url)
    } else {
        format!("GitHub API returned {} for {}", status, url)
    };

    Err(RegistryError::GitHubApi {
        message,
        status_code: Some(status.as_u16()),
    })
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn get_repo(&self, repo: &RepoCoordinate) -> Result<GitHubRepo> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.repo], &[])?;
        self.get_json(url).await
    }

    async fn get_tree(&self, repo: &RepoCoordinate, branch: &str) -> Result<GitHubTree> {
        let url = self.endpoint(
            &["repos", &repo.owner, &repo.repo, "git", "trees", branch],
            &[("recursive", "1")],
        )?;
        let tree: GitHubTree = self.get_json(url).await?;
        if tree.truncated {
            tracing::warn!("Tree listing for {} was truncated by GitHub", repo);
        }
        Ok(tree)
    }

    async fn get_file_content(
        &self,
        repo: &RepoCoordinate,
        path: &str,
        branch: &str,
    ) -> Result<GitHubContent> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"];
        segments.extend(path.split('/'));
        let url = self.endpoint(&segments, &[("ref", branch)])?;
        self.get_json(url).await
    }

    async fn list_tags(&self, repo: &RepoCoordinate) -> Result<Vec<GitHubTag>> {
        let per_page = NetworkConfig::TAGS_PER_PAGE.to_string();
        let url = self.endpoint(
            &["repos", &repo.owner, &repo.repo, "tags"],
            &[("per_page", per_page.as_str())],
        )?;
        self.get_json(url).await
    }

    async fn get_commit(&self, repo: &RepoCoordinate, reference: &str) -> Result<GitHubCommit> {
        let url = self.endpoint(&["repos", &repo.owner, &repo.repo, "commits", reference], &[])?;
        self.get_json(url).await
    }
}
