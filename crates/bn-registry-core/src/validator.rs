//! Manifest schema and semantic validation.
//!
//! Validation runs in two passes over an untyped document:
//!
//! 1. **Structural**: types, required fields, patterns, lengths, SemVer and
//!    range syntax, URL syntax.
//! 2. **Semantic**: cross-field invariants (parent must be a dependency, no
//!    self-parenting, dependencies and conflicts disjoint). Only runs when the
//!    structural pass is clean.
//!
//! Every failing constraint yields one [`Diagnostic`]; nothing short-circuits.

use crate::config::ManifestConfig;
use crate::error::{RegistryError, Result};
use crate::models::{AutoupdateType, ModManifest, SourceType};
use crate::version::{is_valid_range, is_valid_version};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// URL-safe mod identifier.
static MOD_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap());

/// Full git commit SHA.
static COMMIT_SHA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{40}$").unwrap());

/// Characters that separate a parent id from a submod suffix.
const PARENT_SEPARATORS: [char; 7] = [' ', '@', '_', '/', '|', '\\', '-'];

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Dotted field path, `$` for the document root.
    pub path: String,
    /// Stable constraint name, suitable for grepping.
    pub constraint: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn new(path: impl Into<String>, constraint: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            constraint,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.constraint, self.message)
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            valid: diagnostics.is_empty(),
            error_count: diagnostics.len(),
            diagnostics,
        }
    }

    /// One line per failing constraint.
    pub fn summary(&self) -> String {
        self.diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Rendered report for the `validate` command.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub valid: bool,
    pub error_count: usize,
    pub output: String,
}

/// Validate an untyped manifest document.
pub fn validate(candidate: &Value) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let Some(object) = candidate.as_object() else {
        diagnostics.push(Diagnostic::new("$", "type", "manifest must be a mapping"));
        return ValidationResult::from_diagnostics(diagnostics);
    };

    check_structure(object, &mut diagnostics);
    if !diagnostics.is_empty() {
        return ValidationResult::from_diagnostics(diagnostics);
    }

    match serde_json::from_value::<ModManifest>(candidate.clone()) {
        Ok(manifest) => diagnostics.extend(check_semantics(&manifest)),
        Err(e) => diagnostics.push(Diagnostic::new("$", "type", e.to_string())),
    }

    ValidationResult::from_diagnostics(diagnostics)
}

/// Validate a typed manifest, e.g. one produced by the synthesizer.
pub fn validate_manifest(manifest: &ModManifest) -> ValidationResult {
    match serde_json::to_value(manifest) {
        Ok(value) => validate(&value),
        Err(e) => ValidationResult::from_diagnostics(vec![Diagnostic::new(
            "$",
            "type",
            e.to_string(),
        )]),
    }
}

/// Fail with [`RegistryError::Validation`] unless `manifest` is valid.
pub fn ensure_valid(manifest: &ModManifest) -> Result<()> {
    let result = validate_manifest(manifest);
    if result.valid {
        return Ok(());
    }
    Err(RegistryError::Validation {
        field: manifest.id.clone(),
        message: result.summary(),
    })
}

/// Validate and render a report labelled with the file name.
pub fn check_manifest(candidate: &Value, label: Option<&str>) -> CheckReport {
    let result = validate(candidate);

    let mut lines = Vec::new();
    if let Some(label) = label {
        lines.push(format!("Checking: {}", label));
    }
    if result.valid {
        lines.push("  ✓ Valid".to_string());
    } else {
        lines.extend(result.diagnostics.iter().map(|d| format!("  ✗ {}", d)));
    }

    CheckReport {
        valid: result.valid,
        error_count: result.error_count,
        output: lines.join("\n"),
    }
}

/// True if `id` is a URL-safe mod identifier.
pub fn is_valid_mod_id(id: &str) -> bool {
    MOD_ID_PATTERN.is_match(id)
}

/// True if `id` looks like a submod of `parent_id` by naming convention.
///
/// `arcana_patch` and `arcana-foo` are submods of `arcana`; `arcanapatch`
/// and `arcana` itself are not.
pub fn has_parent_id_prefix(id: &str, parent_id: &str) -> bool {
    let id = id.to_lowercase();
    let parent_id = parent_id.to_lowercase();

    if parent_id.is_empty() || id.len() <= parent_id.len() {
        return false;
    }

    match id.strip_prefix(&parent_id) {
        Some(rest) => rest.starts_with(PARENT_SEPARATORS),
        None => false,
    }
}

/// Infer the parent mod from the manifest id and its dependencies.
///
/// The first dependency (in declaration order) whose key prefixes the id with
/// a separator wins.
pub fn detect_parent_mod(manifest: &ModManifest) -> Option<String> {
    manifest
        .dependencies
        .as_ref()?
        .keys()
        .find(|dep| has_parent_id_prefix(&manifest.id, dep))
        .cloned()
}

fn check_semantics(manifest: &ModManifest) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let dependency_keys: HashSet<String> = manifest
        .dependencies
        .iter()
        .flat_map(|deps| deps.keys())
        .map(|k| k.to_lowercase())
        .collect();

    if let Some(parent) = &manifest.parent {
        let parent = parent.to_lowercase();

        if !dependency_keys.contains(&parent) {
            diagnostics.push(Diagnostic::new(
                "parent",
                "parent_in_dependencies",
                format!("parent \"{}\" must also be listed in dependencies", parent),
            ));
        }

        if parent == manifest.id.to_lowercase() {
            diagnostics.push(Diagnostic::new(
                "parent",
                "no_self_parent",
                format!("mod \"{}\" cannot be its own parent", manifest.id),
            ));
        }
    }

    if let Some(conflicts) = &manifest.conflicts {
        for key in conflicts.keys() {
            if dependency_keys.contains(&key.to_lowercase()) {
                diagnostics.push(Diagnostic::new(
                    format!("conflicts.{}", key),
                    "conflict_dependency_overlap",
                    format!("\"{}\" appears in both dependencies and conflicts", key),
                ));
            }
        }
    }

    diagnostics
}

fn check_structure(object: &Map<String, Value>, out: &mut Vec<Diagnostic>) {
    match lookup(object, &["schema_version", "schemaVersion"]) {
        None => out.push(required("schema_version")),
        Some(Value::String(s)) if s == ManifestConfig::SCHEMA_VERSION => {}
        Some(Value::String(s)) => out.push(Diagnostic::new(
            "schema_version",
            "literal",
            format!("expected \"{}\", got \"{}\"", ManifestConfig::SCHEMA_VERSION, s),
        )),
        Some(_) => out.push(wrong_type("schema_version", "string")),
    }

    if let Some(id) = required_string(object, &["id"], out) {
        check_mod_id("id", id, out);
    }

    required_string(object, &["display_name", "displayName"], out);

    if let Some(short) = required_string(object, &["short_description", "shortDescription"], out) {
        let length = short.chars().count();
        if length > ManifestConfig::SHORT_DESCRIPTION_MAX {
            out.push(Diagnostic::new(
                "short_description",
                "max_length",
                format!(
                    "must be {} characters or less, got {}",
                    ManifestConfig::SHORT_DESCRIPTION_MAX,
                    length
                ),
            ));
        }
    }

    optional_string(object, &["description"], out);

    match lookup(object, &["author"]) {
        None => out.push(required("author")),
        Some(value) => {
            if let Some(items) = string_array("author", value, out) {
                if items.is_empty() {
                    out.push(Diagnostic::new(
                        "author",
                        "non_empty",
                        "at least one author is required",
                    ));
                }
            }
        }
    }

    optional_string(object, &["license"], out);

    if let Some(homepage) = optional_string(object, &["homepage"], out) {
        check_url("homepage", homepage, out);
    }

    if let Some(version) = required_string(object, &["version"], out) {
        if !is_valid_version(version) {
            out.push(Diagnostic::new(
                "version",
                "semver",
                format!("\"{}\" is not valid SemVer (MAJOR.MINOR.PATCH)", version),
            ));
        }
    }

    for field in ["dependencies", "conflicts"] {
        if let Some(value) = lookup(object, &[field]) {
            check_range_map(field, value, out);
        }
    }

    match lookup(object, &["source"]) {
        None => out.push(required("source")),
        Some(Value::Object(source)) => check_source(source, out),
        Some(_) => out.push(wrong_type("source", "mapping")),
    }

    for field in ["categories", "tags"] {
        if let Some(value) = lookup(object, &[field]) {
            string_array(field, value, out);
        }
    }

    if let Some(icon) = optional_string(object, &["icon_url", "iconUrl"], out) {
        check_url("icon_url", icon, out);
    }

    match lookup(object, &["autoupdate"]) {
        None => {}
        Some(Value::Object(autoupdate)) => check_autoupdate(autoupdate, out),
        Some(_) => out.push(wrong_type("autoupdate", "mapping")),
    }

    if let Some(parent) = optional_string(object, &["parent"], out) {
        check_mod_id("parent", parent, out);
    }

    if let Some(stamp) = optional_string(object, &["last_updated", "lastUpdated"], out) {
        if chrono::DateTime::parse_from_rfc3339(stamp).is_err() {
            out.push(Diagnostic::new(
                "last_updated",
                "datetime",
                format!("\"{}\" is not an ISO-8601 timestamp", stamp),
            ));
        }
    }
}

fn check_source(source: &Map<String, Value>, out: &mut Vec<Diagnostic>) {
    match lookup(source, &["type"]) {
        None => out.push(required("source.type")),
        Some(kind) => check_enum("source.type", kind, &SourceType::ALL, out),
    }

    if let Some(url) = required_string_at("source", source, &["url"], out) {
        check_url("source.url", url, out);
    }

    if let Some(sha) = optional_string_at("source", source, &["commit_sha", "commitSha"], out) {
        if !COMMIT_SHA_PATTERN.is_match(sha) {
            out.push(Diagnostic::new(
                "source.commit_sha",
                "commit_sha",
                "must be exactly 40 lowercase hex characters",
            ));
        }
    }

    optional_string_at("source", source, &["extract_path", "extractPath"], out);
}

fn check_autoupdate(autoupdate: &Map<String, Value>, out: &mut Vec<Diagnostic>) {
    match lookup(autoupdate, &["type"]) {
        None => out.push(required("autoupdate.type")),
        Some(kind) => check_enum("autoupdate.type", kind, &AutoupdateType::ALL, out),
    }

    optional_string_at("autoupdate", autoupdate, &["update_url", "updateUrl"], out);
    optional_string_at("autoupdate", autoupdate, &["branch"], out);

    if let Some(pattern) = optional_string_at("autoupdate", autoupdate, &["regex"], out) {
        if let Err(e) = Regex::new(pattern) {
            out.push(Diagnostic::new(
                "autoupdate.regex",
                "regex",
                format!("invalid tag filter: {}", e),
            ));
        }
    }
}

fn check_range_map(field: &str, value: &Value, out: &mut Vec<Diagnostic>) {
    let Some(map) = value.as_object() else {
        out.push(wrong_type(field, "mapping of mod id to version range"));
        return;
    };

    for (key, range) in map {
        let path = format!("{}.{}", field, key);
        match range {
            Value::String(s) if s.trim().is_empty() => out.push(Diagnostic::new(
                path,
                "non_empty",
                "version constraint cannot be empty",
            )),
            Value::String(s) if !is_valid_range(s) => out.push(Diagnostic::new(
                path,
                "semver_range",
                format!("\"{}\" is not a valid SemVer range", s),
            )),
            Value::String(_) => {}
            _ => out.push(wrong_type(&path, "string")),
        }
    }
}

fn check_mod_id(path: &str, id: &str, out: &mut Vec<Diagnostic>) {
    if !is_valid_mod_id(id) {
        out.push(Diagnostic::new(
            path,
            "pattern",
            format!(
                "\"{}\" must match ^[a-z0-9][a-z0-9_-]*$ (lowercase, digits, _ and -)",
                id
            ),
        ));
    }
}

fn check_url(path: &str, value: &str, out: &mut Vec<Diagnostic>) {
    if url::Url::parse(value).is_err() {
        out.push(Diagnostic::new(
            path,
            "url",
            format!("\"{}\" is not a valid URL", value),
        ));
    }
}

fn check_enum(path: &str, value: &Value, allowed: &[&str], out: &mut Vec<Diagnostic>) {
    match value.as_str() {
        Some(s) if allowed.contains(&s) => {}
        Some(s) => out.push(Diagnostic::new(
            path,
            "enum",
            format!("\"{}\" is not one of: {}", s, allowed.join(", ")),
        )),
        None => out.push(wrong_type(path, "string")),
    }
}

fn string_array<'a>(path: &str, value: &'a Value, out: &mut Vec<Diagnostic>) -> Option<Vec<&'a str>> {
    let Some(items) = value.as_array() else {
        out.push(wrong_type(path, "list of strings"));
        return None;
    };

    let mut strings = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s),
            None => out.push(wrong_type(&format!("{}[{}]", path, i), "string")),
        }
    }
    Some(strings)
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k))
}

fn required_string<'a>(
    object: &'a Map<String, Value>,
    keys: &[&str],
    out: &mut Vec<Diagnostic>,
) -> Option<&'a str> {
    match lookup(object, keys) {
        None => {
            out.push(required(keys[0]));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            out.push(wrong_type(keys[0], "string"));
            None
        }
    }
}

fn required_string_at<'a>(
    parent: &str,
    object: &'a Map<String, Value>,
    keys: &[&str],
    out: &mut Vec<Diagnostic>,
) -> Option<&'a str> {
    let path = format!("{}.{}", parent, keys[0]);
    match lookup(object, keys) {
        None => {
            out.push(required(&path));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            out.push(wrong_type(&path, "string"));
            None
        }
    }
}

fn optional_string<'a>(
    object: &'a Map<String, Value>,
    keys: &[&str],
    out: &mut Vec<Diagnostic>,
) -> Option<&'a str> {
    match lookup(object, keys) {
        None => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            out.push(wrong_type(keys[0], "string"));
            None
        }
    }
}

fn optional_string_at<'a>(
    parent: &str,
    object: &'a Map<String, Value>,
    keys: &[&str],
    out: &mut Vec<Diagnostic>,
) -> Option<&'a str> {
    match lookup(object, keys) {
        None => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            out.push(wrong_type(&format!("{}.{}", parent, keys[0]), "string"));
            None
        }
    }
}

fn required(path: &str) -> Diagnostic {
    Diagnostic::new(path, "required", "field is required")
}

fn wrong_type(path: &str, expected: &str) -> Diagnostic {
    Diagnostic::new(path, "type", format!("expected {}", expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_manifest() -> Value {
        json!({
            "schema_version": "1.0",
            "id": "test_mod",
            "display_name": "Test Mod",
            "short_description": "A test mod",
            "author": ["Test Author"],
            "license": "MIT",
            "version": "1.0.0",
            "source": {
                "type": "github_archive",
                "url": "https://github.com/test/mod/archive/v1.0.0.zip"
            }
        })
    }

    fn constraints(result: &ValidationResult) -> Vec<&'static str> {
        result.diagnostics.iter().map(|d| d.constraint).collect()
    }

    #[test]
    fn test_mod_id_accepts_url_safe_ids() {
        for id in ["arcana", "arcana_patch", "arcana-patch", "3x_healing", "123mod", "mod123"] {
            assert!(is_valid_mod_id(id), "{id} should be valid");
        }
    }

    #[test]
    fn test_mod_id_rejects_unsafe_ids() {
        for id in ["", "Arcana", "TestMod", "test mod", "mod@test", "mod#1", "mod/sub", "_lead", "-lead"] {
            assert!(!is_valid_mod_id(id), "{id:?} should be invalid");
        }
    }

    #[test]
    fn test_valid_manifest_passes() {
        let result = validate(&valid_manifest());
        assert!(result.valid, "{}", result.summary());
        assert_eq!(result.error_count, 0);
    }

    #[test]
    fn test_missing_required_fields() {
        let result = validate(&json!({ "schema_version": "1.0" }));
        assert!(!result.valid);
        let missing: Vec<&str> = result
            .diagnostics
            .iter()
            .filter(|d| d.constraint == "required")
            .map(|d| d.path.as_str())
            .collect();
        for field in ["id", "display_name", "short_description", "author", "version", "source"] {
            assert!(missing.contains(&field), "missing {field}");
        }
    }

    #[test]
    fn test_non_object_is_rejected() {
        let result = validate(&json!(["not", "a", "manifest"]));
        assert!(!result.valid);
        assert_eq!(result.diagnostics[0].path, "$");
    }

    #[test]
    fn test_structural_errors_are_all_reported() {
        let mut manifest = valid_manifest();
        manifest["id"] = json!("Bad Id");
        manifest["version"] = json!("1.0");
        manifest["short_description"] = json!("x".repeat(201));
        manifest["source"]["commit_sha"] = json!("ABC123");
        manifest["dependencies"] = json!({ "bn": "not-a-version" });

        let result = validate(&manifest);
        assert_eq!(result.error_count, 5, "{}", result.summary());
        let found = constraints(&result);
        for expected in ["pattern", "semver", "max_length", "commit_sha", "semver_range"] {
            assert!(found.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_short_description_counts_characters() {
        let mut manifest = valid_manifest();
        manifest["short_description"] = json!("é".repeat(200));
        assert!(validate(&manifest).valid);
    }

    #[test]
    fn test_parent_must_be_dependency() {
        let mut manifest = valid_manifest();
        manifest["id"] = json!("arcana_patch");
        manifest["parent"] = json!("arcana");
        manifest["dependencies"] = json!({ "bn": ">=0.9.1" });

        let result = validate(&manifest);
        assert!(!result.valid);
        assert!(result.summary().contains("dependencies"));
        assert_eq!(constraints(&result), vec!["parent_in_dependencies"]);

        manifest["dependencies"]["arcana"] = json!("*");
        assert!(validate(&manifest).valid);
    }

    #[test]
    fn test_parent_match_is_case_insensitive() {
        let mut manifest = valid_manifest();
        manifest["id"] = json!("arcana_patch");
        manifest["parent"] = json!("arcana");
        manifest["dependencies"] = json!({ "Arcana": "*" });
        assert!(validate(&manifest).valid);
    }

    #[test]
    fn test_self_parent_is_rejected() {
        let mut manifest = valid_manifest();
        manifest["id"] = json!("x");
        manifest["parent"] = json!("x");
        manifest["dependencies"] = json!({ "x": "*" });

        let result = validate(&manifest);
        assert!(!result.valid);
        assert_eq!(constraints(&result), vec!["no_self_parent"]);
    }

    #[test]
    fn test_conflict_dependency_overlap() {
        let mut manifest = valid_manifest();
        manifest["dependencies"] = json!({ "y": "*" });
        manifest["conflicts"] = json!({ "Y": "<2.0.0" });

        let result = validate(&manifest);
        assert!(!result.valid);
        assert!(result.summary().contains("conflict"));
    }

    #[test]
    fn test_semantic_errors_do_not_short_circuit() {
        let mut manifest = valid_manifest();
        manifest["id"] = json!("x");
        manifest["parent"] = json!("x");
        manifest["conflicts"] = json!({ "bn": "<0.9.0" });
        manifest["dependencies"] = json!({ "bn": ">=0.9.1" });

        let result = validate(&manifest);
        let found = constraints(&result);
        assert_eq!(
            found,
            vec!["parent_in_dependencies", "no_self_parent", "conflict_dependency_overlap"]
        );
    }

    #[test]
    fn test_semantic_checks_skipped_on_structural_failure() {
        let mut manifest = valid_manifest();
        manifest["version"] = json!("nope");
        manifest["parent"] = json!("missing");

        let result = validate(&manifest);
        assert_eq!(constraints(&result), vec!["semver"]);
    }

    #[test]
    fn test_enum_and_url_checks() {
        let mut manifest = valid_manifest();
        manifest["source"]["type"] = json!("svn_checkout");
        manifest["homepage"] = json!("not a url");
        manifest["autoupdate"] = json!({ "type": "nightly", "regex": "([" });

        let result = validate(&manifest);
        let found = constraints(&result);
        assert_eq!(found.iter().filter(|c| **c == "enum").count(), 2);
        assert!(found.contains(&"url"));
        assert!(found.contains(&"regex"));
    }

    #[test]
    fn test_autoupdate_templates_are_allowed() {
        let mut manifest = valid_manifest();
        manifest["autoupdate"] = json!({
            "type": "tag",
            "url": "https://github.com/test/mod/archive/refs/tags/$version.zip"
        });
        assert!(validate(&manifest).valid);
    }

    #[test]
    fn test_check_manifest_report() {
        let report = check_manifest(&valid_manifest(), Some("test.yaml"));
        assert!(report.valid);
        assert!(report.output.contains("test.yaml"));
        assert!(report.output.contains("✓ Valid"));

        let report = check_manifest(&json!({}), Some("test.yaml"));
        assert!(!report.valid);
        assert!(report.output.contains("✗"));
        assert_eq!(report.output.lines().count(), 1 + report.error_count);
    }

    #[test]
    fn test_has_parent_id_prefix() {
        assert!(has_parent_id_prefix("arcana_foo_patch", "arcana"));
        assert!(has_parent_id_prefix("arcana_patch", "arcana"));
        assert!(has_parent_id_prefix("arcana-foo-patch", "arcana"));
        assert!(has_parent_id_prefix("Arcana patch", "arcana"));
        assert!(!has_parent_id_prefix("arcana", "arcana"));
        assert!(!has_parent_id_prefix("other_mod", "arcana"));
        assert!(!has_parent_id_prefix("arcanapatch", "arcana"));
        assert!(!has_parent_id_prefix("arcana_", ""));
    }

    #[test]
    fn test_detect_parent_mod() {
        let mut manifest = ModManifest::new("arcana_foo_patch", "Patch", "https://example.com/a.zip");
        manifest.dependencies = Some(
            [("arcana", "*"), ("bn", ">=0.9.1")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        assert_eq!(detect_parent_mod(&manifest), Some("arcana".to_string()));

        let mut standalone = ModManifest::new("standalone_mod", "Standalone", "https://example.com/b.zip");
        standalone.dependencies = Some(
            [("bn".to_string(), ">=0.9.1".to_string())].into_iter().collect(),
        );
        assert_eq!(detect_parent_mod(&standalone), None);

        standalone.dependencies = None;
        assert_eq!(detect_parent_mod(&standalone), None);
    }
}
