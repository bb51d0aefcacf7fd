//! Upstream `modinfo.json` descriptor record.

use serde::{Deserialize, Serialize};

/// One `MOD_INFO` entry from a mod's own `modinfo.json`.
///
/// This is the game's native format, not what the registry stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Mod ids this mod depends on. `dda` is the legacy base game id.
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub obsolete: Option<bool>,
    #[serde(default)]
    pub maintainers: Option<Vec<String>>,
}
