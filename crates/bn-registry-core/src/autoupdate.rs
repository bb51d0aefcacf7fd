//! Autoupdate: detect newer upstream versions and rewrite manifests.
//!
//! Each manifest goes through a single pass:
//!
//! 1. No `autoupdate` policy, or no resolvable repository: nothing to do.
//! 2. Resolve a candidate version from the newest matching tag, or from the
//!    branch head as `YYYY.MM.DD-<sha7>` keyed on the commit date.
//! 3. Candidate equal to the stored version (or, for tags, not newer): nothing
//!    to do.
//! 4. Substitute `$version` into the templated fields and HEAD-check the
//!    resulting URLs. Any unreachable URL is an error and the file on disk is
//!    left exactly as it was.
//! 5. Persist.

use crate::config::ManifestConfig;
use crate::error::{RegistryError, Result};
use crate::github_url::{extract_repo_url, parse_github_url, RepoCoordinate};
use crate::models::{AutoupdateType, ModManifest};
use crate::network::{check_urls, LinkChecker, SourceHost};
use crate::store;
use crate::synthesize::timestamp_now;
use crate::validator::ensure_valid;
use crate::version::{compare_versions, parse_version};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one manifest's autoupdate pass that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// New version applied and verified.
    Updated {
        previous: String,
        manifest: Box<ModManifest>,
    },
    /// Upstream has nothing newer.
    UpToDate { version: String },
    /// Manifest has no autoupdate policy.
    NotConfigured,
    /// No repository could be derived from the manifest.
    NoTarget,
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// Counters for a directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoupdateSummary {
    pub total: usize,
    pub updated: usize,
    pub errors: usize,
    pub skipped: usize,
    /// File and message for every error.
    pub failures: Vec<(PathBuf, String)>,
}

/// Read `.manifestignore` from `dir`.
///
/// Patterns are lowercased; blank lines and `#` comments are dropped. A
/// missing file means nothing is ignored.
pub fn load_manifest_ignore(dir: &Path) -> HashSet<String> {
    let path = dir.join(ManifestConfig::IGNORE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => parse_manifest_ignore(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => HashSet::new(),
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            HashSet::new()
        }
    }
}

pub fn parse_manifest_ignore(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

/// Repository a manifest belongs to: homepage first, then the download URL.
fn manifest_repo(manifest: &ModManifest) -> Option<RepoCoordinate> {
    let url = manifest
        .homepage
        .clone()
        .or_else(|| extract_repo_url(&manifest.source.url))?;
    parse_github_url(&url)
}

/// True if `github.com/<owner>/<repo>/<id>` is listed in `ignored`.
pub fn should_ignore(manifest: &ModManifest, ignored: &HashSet<String>) -> bool {
    if ignored.is_empty() {
        return false;
    }
    manifest_repo(manifest).is_some_and(|repo| {
        let pattern = format!("github.com/{}/{}/{}", repo.owner, repo.repo, manifest.id).to_lowercase();
        ignored.contains(&pattern)
    })
}

/// Repository to poll: `update_url`, then homepage, then the download URL.
/// The first one that names a GitHub repository wins.
pub fn resolve_update_target(manifest: &ModManifest) -> Option<RepoCoordinate> {
    let autoupdate = manifest.autoupdate.as_ref()?;
    [
        autoupdate.update_url.clone(),
        manifest.homepage.clone(),
        extract_repo_url(&manifest.source.url),
    ]
    .into_iter()
    .flatten()
    .find_map(|url| parse_github_url(&url))
}

/// `YYYY.MM.DD-<sha7>` for a commit.
pub fn calver(date: DateTime<Utc>, sha: &str) -> String {
    let short: String = sha.chars().take(7).collect();
    format!("{}-{}", date.format("%Y.%m.%d"), short)
}

/// Set the version and rewrite every `$version` template.
///
/// Template keys map onto fields: `url` to `source.url`, `icon_url` to
/// `icon_url`, `commit_sha` to `source.commit_sha` (camelCase spellings are
/// accepted). Unknown keys are ignored.
pub fn apply_version_update(manifest: &ModManifest, version: &str) -> ModManifest {
    let mut updated = manifest.clone();
    updated.version = version.to_string();

    if let Some(autoupdate) = &manifest.autoupdate {
        for (key, template) in &autoupdate.templates {
            let Some(template) = template.as_str() else {
                continue;
            };
            let value = template.replace(ManifestConfig::VERSION_PLACEHOLDER, version);
            match key.as_str() {
                "url" => updated.source.url = value,
                "icon_url" | "iconUrl" => updated.icon_url = Some(value),
                "commit_sha" | "commitSha" => updated.source.commit_sha = Some(value),
                other => debug!("Ignoring autoupdate template key {}", other),
            }
        }
    }

    updated.last_updated = Some(timestamp_now());
    updated
}

/// URLs that must resolve before an updated manifest is saved.
pub fn verification_urls(manifest: &ModManifest) -> Vec<String> {
    std::iter::once(manifest.source.url.clone())
        .chain(manifest.icon_url.clone())
        .collect()
}

/// Drives autoupdate against a source host and a link checker.
pub struct AutoupdateEngine<'a> {
    host: &'a dyn SourceHost,
    checker: &'a dyn LinkChecker,
}

impl<'a> AutoupdateEngine<'a> {
    pub fn new(host: &'a dyn SourceHost, checker: &'a dyn LinkChecker) -> Self {
        Self { host, checker }
    }

    /// Latest upstream version for a manifest.
    ///
    /// `Ok(None)` when the manifest has no policy or no resolvable repository.
    pub async fn get_latest_version(&self, manifest: &ModManifest) -> Result<Option<String>> {
        let Some(autoupdate) = &manifest.autoupdate else {
            return Ok(None);
        };
        let Some(repo) = resolve_update_target(manifest) else {
            return Ok(None);
        };

        let version = match autoupdate.update_type {
            AutoupdateType::Tag => self.latest_tag(&repo, autoupdate.regex.as_deref()).await?,
            AutoupdateType::Commit => {
                let branch = autoupdate.branch.as_deref().unwrap_or(ManifestConfig::DEFAULT_BRANCH);
                self.latest_commit(&repo, branch).await?
            }
        };
        Ok(Some(version))
    }

    async fn latest_tag(&self, repo: &RepoCoordinate, filter: Option<&str>) -> Result<String> {
        let filter = filter
            .map(Regex::new)
            .transpose()
            .map_err(|e| RegistryError::Validation {
                field: "autoupdate.regex".to_string(),
                message: e.to_string(),
            })?;

        let tags = self.host.list_tags(repo).await?;
        let mut names: Vec<String> = tags
            .into_iter()
            .map(|t| t.name)
            .filter(|name| filter.as_ref().map_or(true, |re| re.is_match(name)))
            .collect();

        names.sort_by(|a, b| compare_versions(b, a));
        names
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::Other(format!("No matching tags in {}", repo)))
    }

    async fn latest_commit(&self, repo: &RepoCoordinate, branch: &str) -> Result<String> {
        let commit = self.host.get_commit(repo, branch).await?;
        let date = commit.committed_at().unwrap_or_else(|| {
            debug!("No commit date for {}@{}, using today", repo, branch);
            Utc::now()
        });
        Ok(calver(date, &commit.sha))
    }

    /// Run the autoupdate pass for one manifest without touching disk.
    pub async fn update_manifest(&self, manifest: &ModManifest) -> Result<UpdateOutcome> {
        let Some(autoupdate) = &manifest.autoupdate else {
            return Ok(UpdateOutcome::NotConfigured);
        };

        let Some(candidate) = self.get_latest_version(manifest).await? else {
            warn!("No repository to poll for {}", manifest.id);
            return Ok(UpdateOutcome::NoTarget);
        };

        if parse_version(&candidate).is_none() {
            return Err(RegistryError::InvalidVersionTag { tag: candidate });
        }

        let up_to_date = candidate == manifest.version
            || (autoupdate.update_type == AutoupdateType::Tag
                && compare_versions(&candidate, &manifest.version) != Ordering::Greater);
        if up_to_date {
            debug!("{} already at {}", manifest.id, manifest.version);
            return Ok(UpdateOutcome::UpToDate {
                version: manifest.version.clone(),
            });
        }

        info!("{}: {} -> {}", manifest.id, manifest.version, candidate);
        let updated = apply_version_update(manifest, &candidate);
        ensure_valid(&updated)?;

        let urls = verification_urls(&updated);
        for result in check_urls(self.checker, &urls).await {
            result.into_result()?;
        }

        Ok(UpdateOutcome::Updated {
            previous: manifest.version.clone(),
            manifest: Box::new(updated),
        })
    }

    /// Update a manifest file in place. The file is only written on success.
    pub async fn update_manifest_file(&self, path: &Path) -> Result<UpdateOutcome> {
        let manifest = store::read_manifest(path)?;
        let outcome = self.update_manifest(&manifest).await?;
        if let UpdateOutcome::Updated { manifest: updated, .. } = &outcome {
            store::write_manifest_to(path, updated)?;
        }
        Ok(outcome)
    }

    /// Update every manifest in `dir`, honoring `.manifestignore`.
    ///
    /// Per-file failures are counted, never propagated.
    pub async fn update_all_manifests(&self, dir: &Path) -> Result<AutoupdateSummary> {
        let ignored = load_manifest_ignore(dir);
        if !ignored.is_empty() {
            info!("Loaded {} entries from {}", ignored.len(), ManifestConfig::IGNORE_FILE);
        }

        let (paths, _) = store::list_manifests(dir)?;
        let mut summary = AutoupdateSummary::default();

        for path in paths {
            summary.total += 1;

            if let Ok(manifest) = store::read_manifest(&path) {
                if should_ignore(&manifest, &ignored) {
                    info!("Skipping {} (listed in {})", path.display(), ManifestConfig::IGNORE_FILE);
                    summary.skipped += 1;
                    continue;
                }
            }

            match self.update_manifest_file(&path).await {
                Ok(UpdateOutcome::Updated { manifest, .. }) => {
                    info!("Updated {} to {}", path.display(), manifest.version);
                    summary.updated += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Autoupdate failed for {}: {}", path.display(), e);
                    summary.errors += 1;
                    summary.failures.push((path, e.to_string()));
                }
            }
        }

        Ok(summary)
    }
}
