//! Registry manifest types.
//!
//! Field order here is the canonical key order of written YAML files. Older
//! manifests written with camelCase keys are accepted on read.

use crate::config::ManifestConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mapping of mod id to SemVer range. `bn` is the base game.
pub type Dependencies = IndexMap<String, String>;

/// Kind of archive a manifest points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    GithubArchive,
    GitlabArchive,
    DirectUrl,
}

impl SourceType {
    pub const ALL: [&'static str; 3] = ["github_archive", "gitlab_archive", "direct_url"];
}

/// Where to download a mod from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub url: String,
    #[serde(default, alias = "commitSha", skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(default, alias = "extractPath", skip_serializing_if = "Option::is_none")]
    pub extract_path: Option<String>,
}

/// How autoupdate looks for new versions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutoupdateType {
    Tag,
    Commit,
}

impl AutoupdateType {
    pub const ALL: [&'static str; 2] = ["tag", "commit"];
}

/// Autoupdate policy.
///
/// Keys beyond the reserved ones are substitution templates: `url`,
/// `icon_url` and `commit_sha` values have `$version` replaced and are
/// written to the matching manifest field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoupdateConfig {
    #[serde(rename = "type")]
    pub update_type: AutoupdateType,
    #[serde(default, alias = "updateUrl", skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(flatten)]
    pub templates: IndexMap<String, serde_json::Value>,
}

impl AutoupdateConfig {
    /// Keys that configure the lookup rather than name a template.
    pub const RESERVED_KEYS: [&'static str; 5] = ["type", "update_url", "updateUrl", "branch", "regex"];

    /// Commit-tracking policy for a branch.
    pub fn commit(branch: impl Into<String>) -> Self {
        Self {
            update_type: AutoupdateType::Commit,
            update_url: None,
            branch: Some(branch.into()),
            regex: None,
            templates: IndexMap::new(),
        }
    }

    /// Tag-tracking policy with an optional tag filter.
    pub fn tag(regex: Option<String>) -> Self {
        Self {
            update_type: AutoupdateType::Tag,
            update_url: None,
            branch: None,
            regex,
            templates: IndexMap::new(),
        }
    }

    /// Add a `$version` template for a target key.
    pub fn with_template(mut self, key: &str, template: &str) -> Self {
        self.templates
            .insert(key.to_string(), serde_json::Value::String(template.to_string()));
        self
    }
}

/// The persisted registry record for one mod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModManifest {
    #[serde(alias = "schemaVersion")]
    pub schema_version: String,
    pub id: String,
    #[serde(alias = "displayName")]
    pub display_name: String,
    #[serde(alias = "shortDescription")]
    pub short_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: Vec<String>,
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Dependencies>,
    pub source: ModSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, alias = "iconUrl", skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoupdate: Option<AutoupdateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, alias = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

fn default_license() -> String {
    ManifestConfig::DEFAULT_LICENSE.to_string()
}

impl ModManifest {
    /// Minimal manifest with registry defaults filled in.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            schema_version: ManifestConfig::SCHEMA_VERSION.to_string(),
            id: id.into(),
            display_name: display_name.into(),
            short_description: String::new(),
            description: None,
            author: Vec::new(),
            license: default_license(),
            homepage: None,
            version: ManifestConfig::DEFAULT_VERSION.to_string(),
            dependencies: None,
            conflicts: None,
            source: ModSource {
                source_type: SourceType::GithubArchive,
                url: url.into(),
                commit_sha: None,
                extract_path: None,
            },
            categories: None,
            tags: None,
            icon_url: None,
            autoupdate: None,
            parent: None,
            last_updated: None,
        }
    }

    /// File name this manifest is stored under.
    pub fn file_name(&self) -> String {
        format!("{}.yaml", self.id)
    }
}
