//! Centralized configuration for the registry engine.
//!
//! Constants for network access, URL verification and manifest conventions.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_WEB_BASE: &'static str = "https://github.com";
    pub const GITHUB_ACCEPT: &'static str = "application/vnd.github.v3+json";
    pub const USER_AGENT: &'static str = "bn-registry/1.0";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// GitHub's maximum page size; tags are listed in a single call.
    pub const TAGS_PER_PAGE: u32 = 100;
    pub const API_MAX_ATTEMPTS: u32 = 3;
    pub const API_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
}

/// Settings for HEAD-request URL verification.
pub struct UrlCheckConfig;

impl UrlCheckConfig {
    pub const ATTEMPTS: u32 = 3;
    pub const RETRY_DELAY: Duration = Duration::from_secs(5);
    pub const TIMEOUT: Duration = Duration::from_secs(30);
}

/// Manifest and descriptor conventions.
pub struct ManifestConfig;

impl ManifestConfig {
    pub const SCHEMA_VERSION: &'static str = "1.0";
    pub const DESCRIPTOR_FILENAME: &'static str = "modinfo.json";
    pub const MOD_INFO_TYPE: &'static str = "MOD_INFO";
    pub const DEFAULT_LICENSE: &'static str = "ALL-RIGHTS-RESERVED";
    pub const DEFAULT_AUTHOR: &'static str = "Unknown";
    pub const DEFAULT_VERSION: &'static str = "0.0.0";
    pub const BASE_GAME_ID: &'static str = "bn";
    pub const LEGACY_BASE_GAME_ID: &'static str = "dda";
    pub const BASE_GAME_DEFAULT_RANGE: &'static str = ">=0.9.1";
    pub const ANY_VERSION_RANGE: &'static str = "*";
    pub const SHORT_DESCRIPTION_MAX: usize = 200;
    pub const IGNORE_FILE: &'static str = ".manifestignore";
    pub const DEFAULT_BRANCH: &'static str = "main";
    pub const DEFAULT_DIR: &'static str = "manifests";
    pub const EXTENSIONS: &'static [&'static str] = &["yaml", "yml", "json"];
    /// Placeholder replaced by the resolved version in autoupdate templates.
    pub const VERSION_PLACEHOLDER: &'static str = "$version";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(NetworkConfig::REQUEST_TIMEOUT > Duration::ZERO);
        assert!(UrlCheckConfig::TIMEOUT >= UrlCheckConfig::RETRY_DELAY);
    }

    #[test]
    fn test_base_game_range_is_a_range() {
        assert!(crate::version::is_valid_range(
            ManifestConfig::BASE_GAME_DEFAULT_RANGE
        ));
        assert!(crate::version::is_valid_range(
            ManifestConfig::ANY_VERSION_RANGE
        ));
    }
}
