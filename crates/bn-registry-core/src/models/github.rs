//! GitHub REST API response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
}

/// Entry of a git tree listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubTreeItem {
    pub path: String,
    /// `blob`, `tree` or `commit` (submodule).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl GitHubTreeItem {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubTree {
    pub sha: String,
    pub tree: Vec<GitHubTreeItem>,
    #[serde(default)]
    pub truncated: bool,
}

/// `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubContent {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Author or committer signature of a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSignature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Inner git commit data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub committer: Option<GitHubSignature>,
}

/// `GET /repos/{owner}/{repo}/commits/{ref}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    #[serde(default)]
    pub commit: Option<GitHubCommitDetail>,
}

impl GitHubCommit {
    /// Committer timestamp, when the API provided one.
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.as_ref()?.committer.as_ref()?.date
    }
}

/// Commit reference of a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubTagCommit {
    pub sha: String,
}

/// Entry of `GET /repos/{owner}/{repo}/tags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubTag {
    pub name: String,
    pub commit: GitHubTagCommit,
}
