//! Repository discovery.
//!
//! Walks a repository tree, fetches every `modinfo.json` and returns the
//! `MOD_INFO` entries found, tagged with the directory they live in.

use crate::config::ManifestConfig;
use crate::descriptor::parse_mod_info;
use crate::error::{RegistryError, Result};
use crate::github_url::{decode_base64_utf8, RepoCoordinate};
use crate::models::ModInfo;
use crate::network::SourceHost;
use tracing::{debug, info, warn};

/// A descriptor entry and the repository directory it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredMod {
    pub descriptor: ModInfo,
    /// Directory of the descriptor file, empty for the repository root.
    pub path: String,
}

/// Branch and head commit of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoMetadata {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    /// Empty when the head commit could not be looked up.
    pub commit_sha: String,
}

/// Look up the default branch and its head commit.
///
/// The commit lookup is best effort; the repository lookup is not.
pub async fn fetch_repo_metadata(host: &dyn SourceHost, repo: &RepoCoordinate) -> Result<RepoMetadata> {
    let info = host.get_repo(repo).await?;
    let default_branch = info.default_branch;

    let commit_sha = match host.get_commit(repo, &default_branch).await {
        Ok(commit) => commit.sha,
        Err(e) => {
            warn!("Could not resolve head of {}@{}: {}", repo, default_branch, e);
            String::new()
        }
    };

    Ok(RepoMetadata {
        owner: repo.owner.clone(),
        repo: repo.repo.clone(),
        default_branch,
        commit_sha,
    })
}

/// Find every mod descriptor on `branch`.
///
/// `on_progress(current, total, message)` is called once before the tree is
/// listed with `(0, 0, ..)` and then once per descriptor file, whether or not
/// that file could be read. A failure to list the tree is an error; a failure
/// on an individual file is logged and the file skipped.
pub async fn discover_mods(
    host: &dyn SourceHost,
    repo: &RepoCoordinate,
    branch: &str,
    on_progress: &mut dyn FnMut(usize, usize, &str),
) -> Result<Vec<DiscoveredMod>> {
    on_progress(0, 0, "Scanning repository...");

    let tree = host.get_tree(repo, branch).await?;
    let descriptor_paths: Vec<&str> = tree
        .tree
        .iter()
        .filter(|item| item.is_blob() && item.path.ends_with(ManifestConfig::DESCRIPTOR_FILENAME))
        .map(|item| item.path.as_str())
        .collect();

    let total = descriptor_paths.len();
    if total == 0 {
        info!("No {} found in {}@{}", ManifestConfig::DESCRIPTOR_FILENAME, repo, branch);
        return Ok(Vec::new());
    }
    debug!("Found {} descriptor file(s) in {}@{}", total, repo, branch);

    let mut mods = Vec::new();
    for (i, path) in descriptor_paths.into_iter().enumerate() {
        on_progress(i + 1, total, &format!("Fetching {}...", path));

        match fetch_descriptors(host, repo, path, branch).await {
            Ok(descriptors) => {
                let dir = descriptor_dir(path);
                mods.extend(
                    descriptors
                        .into_iter()
                        .filter(|d| !d.id.is_empty())
                        .map(|descriptor| DiscoveredMod {
                            descriptor,
                            path: dir.to_string(),
                        }),
                );
            }
            Err(e) => warn!("Skipping {}: {}", path, e),
        }
    }

    info!("Discovered {} mod(s) in {}", mods.len(), repo);
    Ok(mods)
}

async fn fetch_descriptors(
    host: &dyn SourceHost,
    repo: &RepoCoordinate,
    path: &str,
    branch: &str,
) -> Result<Vec<ModInfo>> {
    let content = host.get_file_content(repo, path, branch).await?;
    let encoded = content.content.filter(|c| !c.is_empty()).ok_or_else(|| RegistryError::Decode {
        message: format!("{} has no inline content", path),
    })?;
    let text = decode_base64_utf8(&encoded)?;
    parse_mod_info(&text)
}

/// `mods/a/modinfo.json` -> `mods/a`, `modinfo.json` -> ``.
fn descriptor_dir(path: &str) -> &str {
    if path == ManifestConfig::DESCRIPTOR_FILENAME {
        return "";
    }
    path.strip_suffix(ManifestConfig::DESCRIPTOR_FILENAME)
        .and_then(|p| p.strip_suffix('/'))
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_dir() {
        assert_eq!(descriptor_dir("modinfo.json"), "");
        assert_eq!(descriptor_dir("Arcana/modinfo.json"), "Arcana");
        assert_eq!(descriptor_dir("mods/nested/a/modinfo.json"), "mods/nested/a");
        // Suffix match without a directory separator keeps the full path.
        assert_eq!(descriptor_dir("old_modinfo.json"), "old_modinfo.json");
    }
}
