//! BN Registry - manifest lifecycle engine for the Cataclysm: Bright Nights
//! mod registry.
//!
//! The registry is a directory of YAML manifests, one per mod. This crate
//! covers everything that happens to those files:
//!
//! - discovering mods in a GitHub repository and synthesizing manifests
//! - reconciling generated manifests with what is already on disk
//! - validating manifests against the registry schema
//! - polling upstream for new versions and rewriting manifests (autoupdate)
//! - checking that download and icon URLs still resolve
//!
//! Network access goes through the [`SourceHost`] and [`LinkChecker`] traits,
//! so every pipeline can be driven by in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use bn_registry::{AutoupdateEngine, GitHubClient, HttpLinkChecker};
//!
//! #[tokio::main]
//! async fn main() -> bn_registry::Result<()> {
//!     let github = GitHubClient::new(std::env::var("GITHUB_TOKEN").ok())?;
//!     let checker = HttpLinkChecker::new()?;
//!     let engine = AutoupdateEngine::new(&github, &checker);
//!
//!     let summary = engine.update_all_manifests("manifests".as_ref()).await?;
//!     println!("{}/{} updated", summary.updated, summary.total);
//!     Ok(())
//! }
//! ```

pub mod autoupdate;
pub mod check;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod github_url;
pub mod models;
pub mod network;
pub mod reconcile;
pub mod store;
pub mod synthesize;
pub mod validator;
pub mod version;

// Re-export commonly used types
pub use autoupdate::{AutoupdateEngine, AutoupdateSummary, UpdateOutcome};
pub use check::{check_all_manifests, check_manifest_urls, UrlCheckSummary, ValidateSummary};
pub use discovery::{discover_mods, fetch_repo_metadata, DiscoveredMod, RepoMetadata};
pub use error::{RegistryError, Result};
pub use github_url::{parse_github_url, RepoCoordinate};
pub use models::{AutoupdateConfig, AutoupdateType, ModInfo, ModManifest, ModSource, SourceType};
pub use network::{GitHubClient, HttpLinkChecker, LinkChecker, SourceHost, UrlCheckResult};
pub use reconcile::{reconcile, ReconcileAction, Reconciliation};
pub use synthesize::{synthesize, synthesize_all};
pub use validator::{validate, validate_manifest, CheckReport, Diagnostic, ValidationResult};
