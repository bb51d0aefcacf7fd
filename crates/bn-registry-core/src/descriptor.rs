//! `modinfo.json` parsing and dependency conversion.

use crate::config::ManifestConfig;
use crate::error::Result;
use crate::models::{Dependencies, ModInfo};
use serde_json::Value;
use tracing::warn;

/// Parse descriptor file content into its `MOD_INFO` entries.
///
/// A descriptor file holds either one object or an array of objects; entries
/// of any other `type` are ignored. Entries that fail to deserialize, or have
/// an empty `id` or `name`, are dropped with a warning. Only text that is not
/// JSON at all is an error.
pub fn parse_mod_info(text: &str) -> Result<Vec<ModInfo>> {
    let parsed: Value = serde_json::from_str(text)?;

    let entries = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mods = entries
        .into_iter()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some(ManifestConfig::MOD_INFO_TYPE))
        .filter_map(|entry| match serde_json::from_value::<ModInfo>(entry) {
            Ok(info) if info.id.is_empty() => {
                warn!("Dropping MOD_INFO entry with empty id");
                None
            }
            Ok(info) if info.name.is_empty() => {
                warn!("Dropping MOD_INFO entry {} with empty name", info.id);
                None
            }
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Dropping malformed MOD_INFO entry: {}", e);
                None
            }
        })
        .collect();

    Ok(mods)
}

/// Convert a descriptor dependency list into registry range form.
///
/// Ids are lowercased, the legacy base game id maps to the current one, the
/// base game gets its minimum supported range and everything else `*`.
pub fn convert_dependencies(deps: Option<&[String]>) -> Option<Dependencies> {
    let deps = deps.filter(|d| !d.is_empty())?;

    let converted = deps
        .iter()
        .map(|dep| {
            let mut id = dep.to_lowercase();
            if id == ManifestConfig::LEGACY_BASE_GAME_ID {
                id = ManifestConfig::BASE_GAME_ID.to_string();
            }
            let range = if id == ManifestConfig::BASE_GAME_ID {
                ManifestConfig::BASE_GAME_DEFAULT_RANGE
            } else {
                ManifestConfig::ANY_VERSION_RANGE
            };
            (id, range.to_string())
        })
        .collect();

    Some(converted)
}
