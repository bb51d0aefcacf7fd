//! Data models for the registry.
//!
//! Persisted manifests, upstream descriptors and the subset of GitHub API
//! responses the engine reads.

mod descriptor;
mod github;
mod manifest;

pub use descriptor::*;
pub use github::*;
pub use manifest::*;
