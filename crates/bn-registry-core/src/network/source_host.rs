//! Abstraction over the hosting service that stores mod repositories.
//!
//! Discovery and autoupdate only talk to this trait, so tests drive them with
//! in-memory fakes instead of the network.

use crate::error::Result;
use crate::github_url::RepoCoordinate;
use crate::models::{GitHubCommit, GitHubContent, GitHubRepo, GitHubTag, GitHubTree};
use async_trait::async_trait;

#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Repository metadata, including the default branch.
    async fn get_repo(&self, repo: &RepoCoordinate) -> Result<GitHubRepo>;

    /// Recursive file tree at `branch`.
    async fn get_tree(&self, repo: &RepoCoordinate, branch: &str) -> Result<GitHubTree>;

    /// Single file at `path` on `branch`, base64 encoded.
    async fn get_file_content(
        &self,
        repo: &RepoCoordinate,
        path: &str,
        branch: &str,
    ) -> Result<GitHubContent>;

    /// First page of tags, newest-created first as the host returns them.
    async fn list_tags(&self, repo: &RepoCoordinate) -> Result<Vec<GitHubTag>>;

    /// Commit a branch name, tag or SHA resolves to.
    async fn get_commit(&self, repo: &RepoCoordinate, reference: &str) -> Result<GitHubCommit>;
}
