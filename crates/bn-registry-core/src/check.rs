//! Batch checks over a manifest directory: schema validation and URL
//! reachability.

use crate::error::Result;
use crate::network::{check_urls, LinkChecker, UrlCheckResult};
use crate::store;
use crate::validator::{check_manifest, CheckReport};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Validation report for one file.
#[derive(Debug, Clone)]
pub struct FileCheck {
    pub path: PathBuf,
    pub report: CheckReport,
}

#[derive(Debug, Clone, Default)]
pub struct ValidateSummary {
    pub total: usize,
    pub valid: usize,
    /// Failing constraints across all files; an unreadable file counts once.
    pub errors: usize,
    /// Example/template files that were not checked.
    pub skipped: usize,
    pub files: Vec<FileCheck>,
}

/// Validate one manifest file.
///
/// Read and YAML errors are returned as errors, not as a report.
pub fn check_manifest_file(path: &Path) -> Result<CheckReport> {
    let document = store::read_manifest_value(path)?;
    Ok(check_manifest(&document, Some(&path.display().to_string())))
}

/// Validate every manifest in `dir`.
pub fn check_all_manifests(dir: &Path) -> Result<ValidateSummary> {
    let (paths, skipped) = store::list_manifests(dir)?;
    let mut summary = ValidateSummary {
        skipped,
        ..Default::default()
    };

    for path in paths {
        summary.total += 1;
        let report = match check_manifest_file(&path) {
            Ok(report) => report,
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                CheckReport {
                    valid: false,
                    error_count: 1,
                    output: format!("Checking: {}\n  ✗ {}", path.display(), e),
                }
            }
        };

        if report.valid {
            summary.valid += 1;
        }
        summary.errors += report.error_count;
        summary.files.push(FileCheck { path, report });
    }

    Ok(summary)
}

/// Download and icon URLs of a manifest document.
///
/// Works on untyped documents so that manifests failing validation can still
/// be checked.
pub fn extract_manifest_urls(document: &Value) -> Vec<String> {
    let source_url = document.pointer("/source/url");
    let icon_url = document.get("icon_url").or_else(|| document.get("iconUrl"));

    [source_url, icon_url]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// URL results for one file.
#[derive(Debug, Clone)]
pub struct ManifestUrlReport {
    pub path: PathBuf,
    pub results: Vec<UrlCheckResult>,
}

impl ManifestUrlReport {
    pub fn failures(&self) -> impl Iterator<Item = &UrlCheckResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UrlCheckSummary {
    /// URLs checked.
    pub total: usize,
    pub failed: usize,
    /// `<status or error>\t<url>` per failure.
    pub failed_urls: Vec<String>,
    /// Files that could not be read.
    pub file_errors: usize,
    pub files: Vec<ManifestUrlReport>,
}

/// Check the URLs of one manifest file concurrently.
pub async fn check_manifest_file_urls(checker: &dyn LinkChecker, path: &Path) -> Result<ManifestUrlReport> {
    let document = store::read_manifest_value(path)?;
    let urls = extract_manifest_urls(&document);
    Ok(ManifestUrlReport {
        path: path.to_path_buf(),
        results: check_urls(checker, &urls).await,
    })
}

/// Check the URLs of every manifest in `dir`, one file at a time.
pub async fn check_manifest_urls(checker: &dyn LinkChecker, dir: &Path) -> Result<UrlCheckSummary> {
    let (paths, _) = store::list_manifests(dir)?;
    let mut summary = UrlCheckSummary::default();

    for path in paths {
        let report = match check_manifest_file_urls(checker, &path).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Error processing {}: {}", path.display(), e);
                summary.file_errors += 1;
                continue;
            }
        };

        summary.total += report.results.len();
        for failure in report.failures() {
            summary.failed += 1;
            summary.failed_urls.push(format!(
                "{}\t{}",
                failure.reason().unwrap_or_default(),
                failure.url
            ));
        }
        summary.files.push(report);
    }

    Ok(summary)
}
