//! Autoupdate against in-memory host and link checker, persisting to a temp
//! manifest directory.

mod common;

use bn_registry::store::{read_manifest, write_manifest};
use bn_registry::{AutoupdateConfig, AutoupdateEngine, ModManifest, RegistryError, UpdateOutcome};
use chrono::{TimeZone, Utc};
use common::{FakeChecker, FakeHost, HEAD_SHA};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const TAG_TEMPLATE: &str = "https://github.com/owner/mods/archive/refs/tags/$version.zip";

fn tag_manifest(id: &str, version: &str) -> ModManifest {
    let mut manifest = ModManifest::new(
        id,
        "Tagged",
        TAG_TEMPLATE.replace("$version", &format!("v{}", version)),
    );
    manifest.short_description = "Tag tracked".into();
    manifest.author = vec!["Someone".into()];
    manifest.homepage = Some("https://github.com/owner/mods".into());
    manifest.version = version.into();
    manifest.autoupdate = Some(AutoupdateConfig::tag(Some(r"^v\d".into())).with_template("url", TAG_TEMPLATE));
    manifest
}

fn commit_manifest(id: &str) -> ModManifest {
    let mut manifest = ModManifest::new(id, "Tracked", "https://github.com/owner/mods/archive/refs/heads/main.zip");
    manifest.short_description = "Branch tracked".into();
    manifest.author = vec!["Someone".into()];
    manifest.autoupdate = Some(AutoupdateConfig::commit("main"));
    manifest
}

fn tagged_host() -> FakeHost {
    FakeHost::new().with_tags(&["nightly", "v0.9.0", "v1.10.0", "v1.2.0"])
}

#[tokio::test]
async fn test_tag_update_picks_highest_matching_tag() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(dir.path(), &tag_manifest("tagged", "1.0.0")).unwrap();
    let host = tagged_host();
    let checker = FakeChecker::new();

    let outcome = AutoupdateEngine::new(&host, &checker)
        .update_manifest_file(&path)
        .await
        .unwrap();

    assert!(outcome.is_updated());
    let saved = read_manifest(&path).unwrap();
    assert_eq!(saved.version, "v1.10.0");
    assert_eq!(
        saved.source.url,
        "https://github.com/owner/mods/archive/refs/tags/v1.10.0.zip"
    );
    assert!(saved.last_updated.is_some());
    assert_eq!(checker.checked(), vec![saved.source.url.clone()]);
}

#[tokio::test]
async fn test_failed_verification_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(dir.path(), &tag_manifest("tagged", "1.0.0")).unwrap();
    let before = fs::read(&path).unwrap();

    let host = tagged_host();
    let checker = FakeChecker::new().with_status(
        "https://github.com/owner/mods/archive/refs/tags/v1.10.0.zip",
        404,
    );

    let result = AutoupdateEngine::new(&host, &checker).update_manifest_file(&path).await;

    assert!(matches!(result, Err(RegistryError::UrlUnreachable { .. })));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_zero_padded_tag_is_rejected_before_write() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(dir.path(), &tag_manifest("tagged", "1.0.0")).unwrap();
    let before = fs::read(&path).unwrap();

    let host = FakeHost::new().with_tags(&["v1.2.0", "v01.20.0"]);
    let checker = FakeChecker::new();

    let result = AutoupdateEngine::new(&host, &checker).update_manifest_file(&path).await;

    assert!(matches!(result, Err(RegistryError::Validation { .. })));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(checker.checked().is_empty());
}

#[tokio::test]
async fn test_stored_version_newer_than_tags_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(dir.path(), &tag_manifest("tagged", "2.0.0")).unwrap();
    let before = fs::read(&path).unwrap();
    let host = tagged_host();
    let checker = FakeChecker::new();

    let outcome = AutoupdateEngine::new(&host, &checker)
        .update_manifest_file(&path)
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::UpToDate { version: "2.0.0".into() });
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(checker.checked().is_empty());
}

#[tokio::test]
async fn test_commit_mode_uses_calver_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(dir.path(), &commit_manifest("tracked")).unwrap();
    let date = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
    let host = FakeHost::new().with_commit("main", HEAD_SHA, Some(date));
    let checker = FakeChecker::new();
    let engine = AutoupdateEngine::new(&host, &checker);

    let first = engine.update_manifest_file(&path).await.unwrap();
    assert!(first.is_updated());
    assert_eq!(read_manifest(&path).unwrap().version, "2026.03.04-abcdef0");

    let after_first = fs::read(&path).unwrap();
    let second = engine.update_manifest_file(&path).await.unwrap();
    assert_eq!(
        second,
        UpdateOutcome::UpToDate {
            version: "2026.03.04-abcdef0".into()
        }
    );
    assert_eq!(fs::read(&path).unwrap(), after_first);
}

#[tokio::test]
async fn test_unresolvable_repository_is_noop() {
    let mut manifest = tag_manifest("elsewhere", "1.0.0");
    manifest.homepage = None;
    manifest.source.url = "https://example.com/elsewhere.zip".into();
    let host = tagged_host();
    let checker = FakeChecker::new();

    let outcome = AutoupdateEngine::new(&host, &checker)
        .update_manifest(&manifest)
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::NoTarget);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_directory_summary_counts() {
    let dir = TempDir::new().unwrap();
    write_manifest(dir.path(), &tag_manifest("tagged", "1.0.0")).unwrap();
    write_manifest(dir.path(), &tag_manifest("ignored", "1.0.0")).unwrap();
    write_manifest(dir.path(), &commit_manifest("broken")).unwrap();

    let mut plain = tag_manifest("plain", "1.0.0");
    plain.autoupdate = None;
    write_manifest(dir.path(), &plain).unwrap();

    fs::write(dir.path().join("_example.yaml"), "id: \"example\"\n").unwrap();
    fs::write(
        dir.path().join(".manifestignore"),
        "# pinned\nGitHub.com/owner/mods/ignored\n",
    )
    .unwrap();

    // No commit for "main", so the commit-tracked manifest fails.
    let host = tagged_host();
    let checker = FakeChecker::new();

    let summary = AutoupdateEngine::new(&host, &checker)
        .update_all_manifests(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);
    assert!(summary.failures[0].0.ends_with("broken.yaml"));

    assert_eq!(read_manifest(&dir.path().join("ignored.yaml")).unwrap().version, "1.0.0");
    assert_eq!(read_manifest(&dir.path().join("tagged.yaml")).unwrap().version, "v1.10.0");
}
