//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bn_registry::models::{
    GitHubCommit, GitHubCommitDetail, GitHubContent, GitHubRepo, GitHubSignature, GitHubTag,
    GitHubTagCommit, GitHubTree, GitHubTreeItem,
};
use bn_registry::{LinkChecker, RegistryError, RepoCoordinate, Result, SourceHost, UrlCheckResult};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const HEAD_SHA: &str = "abcdef0123456789abcdef0123456789abcdef01";

fn api_error(message: &str, status: u16) -> RegistryError {
    RegistryError::GitHubApi {
        message: message.to_string(),
        status_code: Some(status),
    }
}

/// A single fake repository.
#[derive(Default)]
pub struct FakeHost {
    pub default_branch: String,
    /// `None` makes the tree listing fail.
    pub tree: Option<Vec<String>>,
    /// Raw file text by path. Paths missing here fail to fetch.
    pub files: HashMap<String, String>,
    pub tags: Vec<String>,
    /// Head commit by reference. Missing references fail.
    pub commits: HashMap<String, (String, Option<DateTime<Utc>>)>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            default_branch: "main".to_string(),
            tree: Some(Vec::new()),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.tree.get_or_insert_with(Vec::new).push(path.to_string());
        self.files.insert(path.to_string(), text.to_string());
        self
    }

    /// A tree entry whose content cannot be fetched.
    pub fn with_broken_file(mut self, path: &str) -> Self {
        self.tree.get_or_insert_with(Vec::new).push(path.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_commit(mut self, reference: &str, sha: &str, date: Option<DateTime<Utc>>) -> Self {
        self.commits.insert(reference.to_string(), (sha.to_string(), date));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SourceHost for FakeHost {
    async fn get_repo(&self, repo: &RepoCoordinate) -> Result<GitHubRepo> {
        self.record(format!("repo {}", repo));
        Ok(GitHubRepo {
            name: repo.repo.clone(),
            full_name: repo.to_string(),
            default_branch: self.default_branch.clone(),
            description: None,
            html_url: repo.web_url(),
        })
    }

    async fn get_tree(&self, repo: &RepoCoordinate, branch: &str) -> Result<GitHubTree> {
        self.record(format!("tree {}@{}", repo, branch));
        let paths = self.tree.as_ref().ok_or_else(|| api_error("Server Error", 500))?;

        // Directories implied by the file paths, listed like the real API does.
        let dirs: HashSet<String> = paths
            .iter()
            .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir.to_string()))
            .collect();

        let tree = dirs
            .into_iter()
            .map(|path| GitHubTreeItem {
                path,
                kind: "tree".to_string(),
                sha: None,
                size: None,
            })
            .chain(paths.iter().map(|path| GitHubTreeItem {
                path: path.clone(),
                kind: "blob".to_string(),
                sha: None,
                size: None,
            }))
            .collect();

        Ok(GitHubTree {
            sha: HEAD_SHA.to_string(),
            tree,
            truncated: false,
        })
    }

    async fn get_file_content(&self, repo: &RepoCoordinate, path: &str, branch: &str) -> Result<GitHubContent> {
        self.record(format!("file {}@{}:{}", repo, branch, path));
        let text = self.files.get(path).ok_or_else(|| api_error("Not found", 404))?;

        // The API wraps base64 at 60 columns.
        let encoded = STANDARD.encode(text.as_bytes());
        let wrapped = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(GitHubContent {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            sha: HEAD_SHA.to_string(),
            kind: "file".to_string(),
            content: Some(wrapped),
            encoding: Some("base64".to_string()),
        })
    }

    async fn list_tags(&self, repo: &RepoCoordinate) -> Result<Vec<GitHubTag>> {
        self.record(format!("tags {}", repo));
        Ok(self
            .tags
            .iter()
            .map(|name| GitHubTag {
                name: name.clone(),
                commit: GitHubTagCommit {
                    sha: HEAD_SHA.to_string(),
                },
            })
            .collect())
    }

    async fn get_commit(&self, repo: &RepoCoordinate, reference: &str) -> Result<GitHubCommit> {
        self.record(format!("commit {}@{}", repo, reference));
        let (sha, date) = self.commits.get(reference).ok_or_else(|| api_error("Not found", 404))?;
        Ok(GitHubCommit {
            sha: sha.clone(),
            commit: Some(GitHubCommitDetail {
                message: None,
                committer: Some(GitHubSignature {
                    name: None,
                    date: *date,
                }),
            }),
        })
    }
}

/// Link checker answering from a fixed status table; unknown URLs are 200.
#[derive(Default)]
pub struct FakeChecker {
    pub statuses: HashMap<String, u16>,
    pub checked: Mutex<Vec<String>>,
}

impl FakeChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkChecker for FakeChecker {
    async fn check(&self, url: &str) -> UrlCheckResult {
        self.checked.lock().unwrap().push(url.to_string());
        match self.statuses.get(url).copied().unwrap_or(200) {
            status @ 200..=399 => UrlCheckResult::reachable(url, status, 1),
            status => UrlCheckResult::unreachable(url, Some(status), format!("HTTP {}", status), 1),
        }
    }
}
