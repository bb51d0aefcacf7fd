//! Build registry manifests from discovered descriptors.

use crate::config::ManifestConfig;
use crate::descriptor::convert_dependencies;
use crate::discovery::{DiscoveredMod, RepoMetadata};
use crate::github_url::{build_archive_url, build_github_path, strip_color_codes, to_manifest_id, truncate_chars};
use crate::models::{AutoupdateConfig, ModManifest, ModSource, SourceType};
use crate::validator::detect_parent_mod;
use crate::version::is_valid_version;
use chrono::{SecondsFormat, Utc};

/// Current time in the format stored in `last_updated`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Synthesize a manifest for one discovered mod.
///
/// The result tracks the branch head through commit autoupdate. Fields the
/// descriptor cannot supply get registry defaults.
pub fn synthesize(
    discovered: &DiscoveredMod,
    owner: &str,
    repo: &str,
    branch: &str,
    commit_sha: &str,
) -> ModManifest {
    let descriptor = &discovered.descriptor;
    let dir = (!discovered.path.is_empty()).then_some(discovered.path.as_str());

    let short_description = descriptor
        .description
        .as_deref()
        .map(|d| truncate_chars(&strip_color_codes(d), ManifestConfig::SHORT_DESCRIPTION_MAX))
        .unwrap_or_default();

    let author = descriptor
        .authors
        .clone()
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| vec![ManifestConfig::DEFAULT_AUTHOR.to_string()]);

    let version = descriptor
        .version
        .as_deref()
        .filter(|v| is_valid_version(v))
        .unwrap_or(ManifestConfig::DEFAULT_VERSION)
        .to_string();

    let mut manifest = ModManifest {
        short_description,
        author,
        homepage: Some(build_github_path(owner, repo, branch, dir)),
        version,
        dependencies: convert_dependencies(descriptor.dependencies.as_deref()),
        source: ModSource {
            source_type: SourceType::GithubArchive,
            url: build_archive_url(owner, repo, branch),
            commit_sha: (!commit_sha.is_empty()).then(|| commit_sha.to_string()),
            extract_path: dir.map(str::to_string),
        },
        categories: descriptor.category.clone().map(|c| vec![c]),
        autoupdate: Some(AutoupdateConfig::commit(branch)),
        last_updated: Some(timestamp_now()),
        ..ModManifest::new(
            to_manifest_id(&descriptor.id),
            strip_color_codes(&descriptor.name),
            String::new(),
        )
    };
    manifest.parent = detect_parent_mod(&manifest);
    manifest
}

/// Synthesize manifests for every discovered mod in a repository.
pub fn synthesize_all(discovered: &[DiscoveredMod], metadata: &RepoMetadata) -> Vec<ModManifest> {
    discovered
        .iter()
        .map(|m| {
            synthesize(
                m,
                &metadata.owner,
                &metadata.repo,
                &metadata.default_branch,
                &metadata.commit_sha,
            )
        })
        .collect()
}
