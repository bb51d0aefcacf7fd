//! Subcommand implementations.
//!
//! Each command returns `Ok(true)` on success and `Ok(false)` when the run
//! completed but found problems; hard failures propagate as errors.

use anyhow::{Context, Result};
use bn_registry::check::{check_all_manifests, check_manifest_file, check_manifest_file_urls, check_manifest_urls};
use bn_registry::github_url::require_github_url;
use bn_registry::network::RateLimitState;
use bn_registry::reconcile::reconcile_into_dir;
use bn_registry::store::to_yaml;
use bn_registry::{
    discover_mods, fetch_repo_metadata, synthesize_all, AutoupdateEngine, DiscoveredMod, GitHubClient,
    HttpLinkChecker, ReconcileAction, UpdateOutcome, UrlCheckResult,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// `validate`: a single file, or every manifest in a directory.
pub fn validate(target: &Path, quiet: bool) -> Result<bool> {
    if !target.is_dir() {
        let report = check_manifest_file(target)?;
        if !quiet || !report.valid {
            println!("{}", report.output);
        }
        return Ok(report.valid);
    }

    if !quiet {
        println!("Checking manifests in {}/\n", target.display());
    }
    let summary = check_all_manifests(target)?;

    for file in &summary.files {
        if !quiet || !file.report.valid {
            println!("{}", file.report.output);
        }
    }

    println!("\nSummary:");
    println!("  Total: {}", summary.total);
    println!("  Valid: {}", summary.valid);
    println!("  Errors: {}", summary.errors);
    if summary.skipped > 0 {
        println!("  Skipped: {} (example files)", summary.skipped);
    }

    Ok(summary.errors == 0)
}

/// Options for `fetch`.
#[derive(Debug)]
pub struct FetchOptions {
    pub url: String,
    pub output: PathBuf,
    pub filter: Option<String>,
    pub dry_run: bool,
    pub token: Option<String>,
}

/// Keep the mods whose directory matches `filter`.
fn filter_mods(mods: Vec<DiscoveredMod>, filter: Option<&Regex>) -> Vec<DiscoveredMod> {
    match filter {
        Some(re) => mods.into_iter().filter(|m| re.is_match(&m.path)).collect(),
        None => mods,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct FetchCounts {
    created: usize,
    updated: usize,
    unchanged: usize,
    failed: usize,
}

impl FetchCounts {
    fn record(&mut self, action: ReconcileAction) {
        match action {
            ReconcileAction::Create => self.created += 1,
            ReconcileAction::Update => self.updated += 1,
            ReconcileAction::Skip => self.unchanged += 1,
        }
    }
}

fn action_label(action: ReconcileAction) -> &'static str {
    match action {
        ReconcileAction::Create => "created",
        ReconcileAction::Update => "updated",
        ReconcileAction::Skip => "unchanged",
    }
}

/// `fetch`: discover, synthesize, reconcile and write.
pub async fn fetch(options: &FetchOptions) -> Result<bool> {
    let repo = require_github_url(&options.url)?;
    let filter = options
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter pattern")?;

    println!("Fetching mods from {}...\n", repo);

    let github = GitHubClient::new(options.token.clone())?;
    let metadata = fetch_repo_metadata(&github, &repo).await?;

    println!("Using branch: {}", metadata.default_branch);
    if !metadata.commit_sha.is_empty() {
        let short: String = metadata.commit_sha.chars().take(8).collect();
        println!("Latest commit: {}", short);
    }

    let mods = discover_mods(&github, &repo, &metadata.default_branch, &mut |current, total, step| {
        if total > 0 {
            info!("[{}/{}] {}", current, total, step);
        } else {
            info!("{}", step);
        }
    })
    .await?;

    if mods.is_empty() {
        println!("No valid MOD_INFO entries found.");
        print_rate_limit(&github.rate_limit_state());
        return Ok(true);
    }
    println!("\nFound {} mod(s)", mods.len());

    let mods = filter_mods(mods, filter.as_ref());
    if let Some(pattern) = &options.filter {
        println!("Filtered to {} mod(s) matching pattern: {}", mods.len(), pattern);
    }
    println!();

    let mut counts = FetchCounts::default();
    for manifest in synthesize_all(&mods, &metadata) {
        let path = options.output.join(manifest.file_name());
        let outcome = match reconcile_into_dir(&options.output, manifest, options.dry_run) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to write {}: {}", path.display(), e);
                println!("  {:<9} {}: {}", "failed", path.display(), e);
                counts.failed += 1;
                continue;
            }
        };
        counts.record(outcome.action);

        if options.dry_run && outcome.action != ReconcileAction::Skip {
            println!("Would write ({}): {}", action_label(outcome.action), path.display());
            println!("{}", to_yaml(&outcome.manifest)?);
        } else {
            println!("  {:<9} {}", action_label(outcome.action), path.display());
        }
    }

    println!(
        "\n✓ {} created, {} updated, {} unchanged",
        counts.created, counts.updated, counts.unchanged
    );
    if counts.failed > 0 {
        println!("✗ {} failed", counts.failed);
    }
    print_rate_limit(&github.rate_limit_state());
    Ok(counts.failed == 0)
}

/// `autoupdate`: a single file, or every manifest in a directory.
pub async fn autoupdate(target: &Path, token: Option<String>) -> Result<bool> {
    let github = GitHubClient::new(token)?;
    let checker = HttpLinkChecker::new()?;
    let engine = AutoupdateEngine::new(&github, &checker);

    let success = if target.is_dir() {
        println!("Updating manifests in {}/", target.display());
        let summary = engine.update_all_manifests(target).await?;

        for (path, message) in &summary.failures {
            println!("  ✗ {}: {}", path.display(), message);
        }

        let skipped = if summary.skipped > 0 {
            format!(", {} skipped", summary.skipped)
        } else {
            String::new()
        };
        println!(
            "\nDone: {}/{} updated, {} errors{}",
            summary.updated, summary.total, summary.errors, skipped
        );
        summary.errors == 0
    } else {
        match engine.update_manifest_file(target).await {
            Ok(UpdateOutcome::Updated { previous, manifest }) => {
                println!("Updated {} -> {}", previous, manifest.version);
                true
            }
            Ok(_) => {
                println!("No update needed");
                true
            }
            Err(e) => {
                error!("Autoupdate failed for {}: {}", target.display(), e);
                println!("Error: {}", e);
                false
            }
        }
    };

    print_rate_limit(&github.rate_limit_state());
    Ok(success)
}

fn format_url_result(result: &UrlCheckResult) -> String {
    if result.ok {
        let status = result.status.map(|s| s.to_string()).unwrap_or_default();
        format!("  OK\t{}\t{}", status, result.url)
    } else {
        format!("  ERROR\t{}\t{}", result.reason().unwrap_or_default(), result.url)
    }
}

/// `check-urls`: a single file, or every manifest in a directory.
pub async fn check_urls(target: &Path) -> Result<bool> {
    let checker = HttpLinkChecker::new()?;

    if !target.is_dir() {
        let report = check_manifest_file_urls(&checker, target).await?;
        for result in &report.results {
            println!("{}", format_url_result(result));
        }

        let failed: Vec<_> = report.failures().collect();
        if !failed.is_empty() {
            println!("\nFailed URLs:");
            for result in failed {
                println!("  {}\t{}", result.reason().unwrap_or_default(), result.url);
            }
            return Ok(false);
        }
        return Ok(true);
    }

    println!("Checking URLs in {}/\n", target.display());
    let summary = check_manifest_urls(&checker, target).await?;

    for file in &summary.files {
        println!("{}", file.path.display());
        for result in &file.results {
            println!("{}", format_url_result(result));
        }
    }

    println!("\nChecked {} URLs", summary.total);
    if summary.file_errors > 0 {
        println!("Unreadable manifests: {}", summary.file_errors);
    }

    if summary.failed > 0 {
        println!("\nFailed URLs ({}):", summary.failed);
        for line in &summary.failed_urls {
            println!("  {}", line);
        }
        return Ok(false);
    }

    println!("All URLs OK!");
    Ok(true)
}

fn print_rate_limit(state: &RateLimitState) {
    if let (Some(remaining), Some(limit)) = (state.remaining, state.limit) {
        println!("GitHub API rate limit: {}/{} remaining", remaining, limit);
    }
}
