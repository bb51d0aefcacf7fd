//! Reconcile freshly generated manifests with what is already on disk.
//!
//! Manifests are often hand-edited after generation (better descriptions,
//! tags, icons). Re-running a fetch must keep those edits while still picking
//! up fields that only upstream knows: the download URL, head commit, version
//! and dependency list.

use crate::error::Result;
use crate::models::{AutoupdateType, ModManifest};
use crate::store;
use crate::validator::ensure_valid;
use crate::version::compare_versions;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

/// How a field is merged when both sides may have it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Keep the existing value. Objects are merged key by key; arrays are
    /// taken from the generated side.
    KeepExisting,
    /// Take the generated value when it has one, otherwise keep the existing.
    PreferGenerated,
    /// Generated side is authoritative, including removal.
    Mirror,
}

/// Per-path merge rules. Paths are dotted (`source.url`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    rules: Vec<(String, MergeRule)>,
}

impl MergePolicy {
    /// Policy where every field keeps its existing value.
    pub fn keep_existing() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, path: impl Into<String>, rule: MergeRule) -> Self {
        let path = path.into();
        self.rules.retain(|(p, _)| *p != path);
        self.rules.push((path, rule));
        self
    }

    pub fn rule_for(&self, path: &str) -> MergeRule {
        self.rules
            .iter()
            .find(|(p, _)| p == path)
            .map_or(MergeRule::KeepExisting, |(_, rule)| *rule)
    }
}

impl Default for MergePolicy {
    /// Upstream-owned fields win; everything else is treated as curated.
    fn default() -> Self {
        Self::keep_existing()
            .with_rule("source.url", MergeRule::PreferGenerated)
            .with_rule("source.commit_sha", MergeRule::PreferGenerated)
            .with_rule("version", MergeRule::PreferGenerated)
            .with_rule("last_updated", MergeRule::PreferGenerated)
            .with_rule("dependencies", MergeRule::Mirror)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No manifest existed.
    Create,
    /// Existing manifest changed.
    Update,
    /// Existing manifest already matches.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub action: ReconcileAction,
    pub manifest: ModManifest,
}

/// Recursively merge `generated` into `existing` under `policy`.
///
/// Keys only present in `existing` survive unless their rule is
/// [`MergeRule::Mirror`]. Keys only present in `generated` are added.
pub fn deep_merge(existing: &Value, generated: &Value, policy: &MergePolicy) -> Value {
    merge_at(existing, generated, policy, "")
}

fn merge_at(existing: &Value, generated: &Value, policy: &MergePolicy, prefix: &str) -> Value {
    let (Value::Object(old), Value::Object(new)) = (existing, generated) else {
        return generated.clone();
    };

    let mut merged: Map<String, Value> = old
        .iter()
        .filter(|(key, _)| new.contains_key(*key) || policy.rule_for(&join(prefix, key)) != MergeRule::Mirror)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (key, new_value) in new {
        let path = join(prefix, key);
        let value = match (policy.rule_for(&path), old.get(key)) {
            (_, None) => new_value.clone(),
            (MergeRule::PreferGenerated | MergeRule::Mirror, Some(_)) => new_value.clone(),
            (MergeRule::KeepExisting, Some(old_value)) => match (old_value, new_value) {
                (Value::Object(_), Value::Object(_)) => merge_at(old_value, new_value, policy, &path),
                (_, Value::Array(_)) => new_value.clone(),
                _ => old_value.clone(),
            },
        };
        merged.insert(key.clone(), value);
    }

    Value::Object(merged)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Structural equality with `last_updated` ignored. Key order is irrelevant.
pub fn equal_ignoring_last_updated(a: &ModManifest, b: &ModManifest) -> Result<bool> {
    let strip = |m: &ModManifest| -> Result<Value> {
        let mut value = serde_json::to_value(m)?;
        if let Value::Object(map) = &mut value {
            map.remove("last_updated");
        }
        Ok(value)
    };
    Ok(strip(a)? == strip(b)?)
}

/// Decide what to do with a generated manifest given the existing one.
pub fn reconcile(existing: Option<&ModManifest>, generated: ModManifest) -> Result<Reconciliation> {
    reconcile_with_policy(existing, generated, &MergePolicy::default())
}

pub fn reconcile_with_policy(
    existing: Option<&ModManifest>,
    generated: ModManifest,
    policy: &MergePolicy,
) -> Result<Reconciliation> {
    let Some(existing) = existing else {
        return Ok(Reconciliation {
            action: ReconcileAction::Create,
            manifest: generated,
        });
    };

    if equal_ignoring_last_updated(existing, &generated)? {
        return Ok(Reconciliation {
            action: ReconcileAction::Skip,
            manifest: existing.clone(),
        });
    }

    let merged = deep_merge(
        &serde_json::to_value(existing)?,
        &serde_json::to_value(&generated)?,
        policy,
    );
    let mut manifest: ModManifest = serde_json::from_value(merged)?;
    keep_fresher_existing(existing, &generated, &mut manifest);

    if equal_ignoring_last_updated(existing, &manifest)? {
        return Ok(Reconciliation {
            action: ReconcileAction::Skip,
            manifest: existing.clone(),
        });
    }

    Ok(Reconciliation {
        action: ReconcileAction::Update,
        manifest,
    })
}

/// Undo generated values that would make a merged manifest staler or
/// inconsistent than the one on disk.
///
/// - the version never moves backwards
/// - a manifest tracking tags keeps its release URL and commit
/// - a curated parent keeps its dependency entry after dependencies are
///   mirrored from upstream
fn keep_fresher_existing(existing: &ModManifest, generated: &ModManifest, merged: &mut ModManifest) {
    if compare_versions(&generated.version, &existing.version) != Ordering::Greater {
        merged.version = existing.version.clone();
    }

    let tracks_commits = existing
        .autoupdate
        .as_ref()
        .map_or(true, |a| a.update_type == AutoupdateType::Commit);
    if !tracks_commits {
        merged.source.url = existing.source.url.clone();
        merged.source.commit_sha = existing.source.commit_sha.clone();
    }

    let Some(parent) = merged.parent.as_deref().map(str::to_lowercase) else {
        return;
    };
    let listed = merged
        .dependencies
        .iter()
        .flat_map(|deps| deps.keys())
        .any(|key| key.to_lowercase() == parent);
    if listed {
        return;
    }
    let kept = existing
        .dependencies
        .iter()
        .flat_map(|deps| deps.iter())
        .find(|(key, _)| key.to_lowercase() == parent);
    if let Some((key, range)) = kept {
        merged
            .dependencies
            .get_or_insert_with(Default::default)
            .insert(key.clone(), range.clone());
    }
}

/// Reconcile against `<dir>/<id>.yaml` and write the result unless skipped
/// or `dry_run` is set.
///
/// A result that fails validation is an error and nothing is written.
pub fn reconcile_into_dir(dir: &Path, generated: ModManifest, dry_run: bool) -> Result<Reconciliation> {
    let existing = store::find_manifest(dir, &generated.id)?;
    let outcome = reconcile(existing.as_ref(), generated)?;

    debug!("{}: {:?}", outcome.manifest.id, outcome.action);
    if outcome.action == ReconcileAction::Skip {
        return Ok(outcome);
    }
    ensure_valid(&outcome.manifest)?;
    if !dry_run {
        store::write_manifest(dir, &outcome.manifest)?;
    }
    Ok(outcome)
}
