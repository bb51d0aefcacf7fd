//! On-disk manifest directory.
//!
//! One `<id>.yaml` per mod. Files starting with `_` are examples/templates
//! and dotfiles are control files (`.manifestignore`); neither is a manifest.
//!
//! Manifests are written in a canonical form so that unchanged data produces
//! byte-identical files: keys in struct order, two-space indentation, every
//! string double-quoted.

use crate::config::ManifestConfig;
use crate::error::{RegistryError, Result};
use crate::models::ModManifest;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use walkdir::WalkDir;

/// Plain (unquoted) YAML keys. Anything else is quoted.
fn is_plain_key(key: &str) -> bool {
    const RESERVED: [&str; 11] = ["true", "false", "null", "yes", "no", "on", "off", "y", "n", "~", ""];
    let starts_ok = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !RESERVED.contains(&key.to_ascii_lowercase().as_str())
}

/// True if a directory entry with this name should be treated as a manifest.
pub fn is_manifest_candidate(file_name: &str) -> bool {
    if file_name.starts_with('_') || file_name.starts_with('.') {
        return false;
    }
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ManifestConfig::EXTENSIONS.contains(&ext))
}

/// Manifest files directly inside `dir`, sorted by file name.
///
/// Also returns how many files with a manifest extension were excluded by
/// the `_`/dotfile rules.
pub fn list_manifests(dir: &Path) -> Result<(Vec<PathBuf>, usize)> {
    if !dir.is_dir() {
        return Err(RegistryError::Io {
            message: format!("Not a directory: {}", dir.display()),
            path: Some(dir.to_path_buf()),
            source: None,
        });
    }

    let mut included = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if is_manifest_candidate(&name) {
            included.push(entry.into_path());
        } else if has_manifest_extension(&name) {
            debug!("Skipping {}", name);
            skipped += 1;
        }
    }

    Ok((included, skipped))
}

fn has_manifest_extension(file_name: &str) -> bool {
    ManifestConfig::EXTENSIONS
        .iter()
        .any(|ext| file_name.ends_with(&format!(".{}", ext)))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| RegistryError::io_with_path(e, path))
}

/// Parse a manifest file into an untyped document, for validation.
pub fn read_manifest_value(path: &Path) -> Result<Value> {
    let text = read_text(path)?;
    serde_yaml::from_str(&text).map_err(|e| RegistryError::Yaml {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })
}

/// Parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<ModManifest> {
    let text = read_text(path)?;
    serde_yaml::from_str(&text).map_err(|e| RegistryError::Yaml {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })
}

/// Read `<dir>/<id>.yaml` if it exists.
pub fn find_manifest(dir: &Path, id: &str) -> Result<Option<ModManifest>> {
    let path = dir.join(format!("{}.yaml", id));
    if !path.exists() {
        return Ok(None);
    }
    read_manifest(&path).map(Some)
}

/// Render a manifest as canonical YAML.
pub fn to_yaml(manifest: &ModManifest) -> Result<String> {
    let value = serde_json::to_value(manifest)?;
    let mut out = String::new();
    match &value {
        Value::Object(map) => emit_mapping(&mut out, map, 0),
        other => {
            emit_scalar(&mut out, other);
            out.push('\n');
        }
    }
    Ok(out)
}

fn emit_mapping(out: &mut String, map: &serde_json::Map<String, Value>, indent: usize) {
    for (key, value) in map {
        pad(out, indent);
        emit_key(out, key);
        emit_value_after_key(out, value, indent);
    }
}

/// Write `value` after `key:` has been written.
fn emit_value_after_key(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Object(map) if map.is_empty() => out.push_str(": {}\n"),
        Value::Array(items) if items.is_empty() => out.push_str(": []\n"),
        Value::Object(map) => {
            out.push_str(":\n");
            emit_mapping(out, map, indent + 2);
        }
        Value::Array(items) => {
            out.push_str(":\n");
            emit_sequence(out, items, indent + 2);
        }
        scalar => {
            out.push_str(": ");
            emit_scalar(out, scalar);
            out.push('\n');
        }
    }
}

fn emit_sequence(out: &mut String, items: &[Value], indent: usize) {
    for item in items {
        pad(out, indent);
        match item {
            Value::Object(map) if !map.is_empty() => {
                out.push_str("- ");
                // First entry shares the dash line; the rest align under it.
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        pad(out, indent + 2);
                    }
                    emit_key(out, key);
                    emit_value_after_key(out, value, indent + 2);
                }
            }
            Value::Array(inner) if !inner.is_empty() => {
                out.push_str("-\n");
                emit_sequence(out, inner, indent + 2);
            }
            Value::Object(_) => out.push_str("- {}\n"),
            Value::Array(_) => out.push_str("- []\n"),
            scalar => {
                out.push_str("- ");
                emit_scalar(out, scalar);
                out.push('\n');
            }
        }
    }
}

fn emit_key(out: &mut String, key: &str) {
    if is_plain_key(key) {
        out.push_str(key);
    } else {
        push_quoted(out, key);
    }
}

fn emit_scalar(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => push_quoted(out, s),
        // Containers are handled by the callers.
        Value::Array(_) | Value::Object(_) => {}
    }
}

/// Double-quoted YAML scalar. JSON escapes are valid YAML escapes; characters
/// YAML treats as line breaks or non-printable are escaped on top of that.
fn push_quoted(out: &mut String, s: &str) {
    let json = Value::String(s.to_string()).to_string();
    for c in json.chars() {
        let needs_escape = c == '\u{7f}'
            || ('\u{80}'..='\u{9f}').contains(&c)
            || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}' | '\u{fffe}' | '\u{ffff}');
        if needs_escape {
            let _ = write!(out, "\\u{:04X}", u32::from(c));
        } else {
            out.push(c);
        }
    }
}

fn pad(out: &mut String, indent: usize) {
    out.push_str(&" ".repeat(indent));
}

/// Write canonical YAML to `path` atomically.
///
/// The YAML is re-parsed before anything touches the disk, then written to a
/// temporary sibling, synced and renamed over the target.
pub fn write_manifest_to(path: &Path, manifest: &ModManifest) -> Result<()> {
    let yaml = to_yaml(manifest)?;
    serde_yaml::from_str::<ModManifest>(&yaml).map_err(|e| RegistryError::Yaml {
        message: format!("Rendered YAML for {} does not parse back: {}", manifest.id, e),
        source: Some(e),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io_with_path(e, parent))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest.file_name());
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, process::id()));

    let write_temp = || -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(yaml.as_bytes())?;
        file.sync_all()
    };

    if let Err(e) = write_temp() {
        let _ = fs::remove_file(&temp_path);
        return Err(RegistryError::io_with_path(e, &temp_path));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RegistryError::io_with_path(e, path)
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Write `<dir>/<id>.yaml`, creating `dir` if needed.
pub fn write_manifest(dir: &Path, manifest: &ModManifest) -> Result<PathBuf> {
    let path = dir.join(manifest.file_name());
    write_manifest_to(&path, manifest)?;
    Ok(path)
}
