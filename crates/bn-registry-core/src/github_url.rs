//! GitHub URL and text helpers shared by discovery, synthesis and autoupdate.

use crate::config::NetworkConfig;
use crate::error::{RegistryError, Result};
use base64::Engine;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Full repository URL, with optional `.git` and trailing path.
static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://github\.com/([^/]+)/([^/]+?)(?:\.git)?(?:/|$)").unwrap()
});

/// `owner/repo` shorthand.
static REPO_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^/]+)/([^/]+)$").unwrap());

/// Any URL mentioning a github.com repository.
static EMBEDDED_REPO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com/([^/]+)/([^/]+)").unwrap());

/// In-game colour markup, e.g. `<color_cyan>` and `</color>`.
static COLOR_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?color[^>]*>").unwrap());

static NON_ID_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").unwrap());

static REPEATED_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoCoordinate {
    pub owner: String,
    pub repo: String,
}

impl RepoCoordinate {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `https://github.com/{owner}/{repo}`
    pub fn web_url(&self) -> String {
        format!("{}/{}/{}", NetworkConfig::GITHUB_WEB_BASE, self.owner, self.repo)
    }
}

impl fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Parse a GitHub repository URL or `owner/repo` shorthand.
///
/// Accepts `https://github.com/owner/repo`, a `.git` suffix, and trailing
/// paths such as `/tree/main/mods`.
pub fn parse_github_url(input: &str) -> Option<RepoCoordinate> {
    let input = input.trim();
    let caps = REPO_URL
        .captures(input)
        .or_else(|| REPO_SHORTHAND.captures(input))?;

    let owner = caps.get(1)?.as_str();
    let repo = caps.get(2)?.as_str();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoCoordinate::new(owner, repo))
}

/// Like [`parse_github_url`] but an error for unusable input.
pub fn require_github_url(input: &str) -> Result<RepoCoordinate> {
    parse_github_url(input).ok_or_else(|| RegistryError::InvalidRepoUrl(input.to_string()))
}

/// Extract the bare repository URL from any github.com URL, e.g. an archive
/// download link.
pub fn extract_repo_url(url: &str) -> Option<String> {
    if !url.contains("github.com") {
        return None;
    }
    let caps = EMBEDDED_REPO.captures(url)?;
    let owner = &caps[1];
    let repo = caps[2].strip_suffix(".git").unwrap_or(&caps[2]);
    Some(format!("{}/{}/{}", NetworkConfig::GITHUB_WEB_BASE, owner, repo))
}

/// Branch archive download URL.
pub fn build_archive_url(owner: &str, repo: &str, branch: &str) -> String {
    format!(
        "{}/{}/{}/archive/refs/heads/{}.zip",
        NetworkConfig::GITHUB_WEB_BASE,
        owner,
        repo,
        branch
    )
}

/// Browser URL for a directory in the repository, or the repository itself
/// when `path` is empty or `.`.
pub fn build_github_path(owner: &str, repo: &str, branch: &str, path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() && p != "." => format!(
            "{}/{}/{}/tree/{}/{}",
            NetworkConfig::GITHUB_WEB_BASE,
            owner,
            repo,
            branch,
            p
        ),
        _ => format!("{}/{}/{}", NetworkConfig::GITHUB_WEB_BASE, owner, repo),
    }
}

/// Decode base64 content returned by the contents API.
///
/// The API wraps the payload at 60 columns; all whitespace is removed before
/// decoding. The bytes must be valid UTF-8.
pub fn decode_base64_utf8(encoded: &str) -> Result<String> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| RegistryError::Decode {
            message: format!("Invalid base64 content: {}", e),
        })?;
    String::from_utf8(bytes).map_err(|e| RegistryError::Decode {
        message: format!("Content is not UTF-8: {}", e),
    })
}

/// Remove in-game colour markup and surrounding whitespace.
pub fn strip_color_codes(text: &str) -> String {
    COLOR_TAG.replace_all(text, "").trim().to_string()
}

/// Sanitize a descriptor id into a registry id.
///
/// Lowercases, replaces anything outside `[a-z0-9_]` with `_`, trims and
/// collapses underscores.
///
/// ```
/// use bn_registry::github_url::to_manifest_id;
///
/// assert_eq!(to_manifest_id("My-Cool Mod!"), "my_cool_mod");
/// assert_eq!(to_manifest_id("__arcana__"), "arcana");
/// ```
pub fn to_manifest_id(mod_id: &str) -> String {
    let lowered = mod_id.to_lowercase();
    let replaced = NON_ID_CHARS.replace_all(&lowered, "_");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
