//! bn-registry - command-line interface for the Cataclysm: Bright Nights mod
//! registry.
//!
//! Thin wrapper over the `bn_registry` library: argument parsing, logging
//! setup, and printing the batch summaries. Exit status is non-zero whenever
//! a batch reports errors.

mod commands;

use anyhow::Result;
use bn_registry::config::ManifestConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bn-registry")]
#[command(version, about = "Cataclysm: Bright Nights Mod Registry CLI")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check manifest files for structural and content validity
    Validate {
        /// Manifest file or directory
        #[arg(default_value = ManifestConfig::DEFAULT_DIR)]
        target: PathBuf,

        /// Only show the summary and failing files
        #[arg(short, long)]
        quiet: bool,
    },

    /// Discover mods in a GitHub repository and write their manifests
    Fetch {
        /// Repository URL or owner/repo
        url: String,

        /// Output directory for manifests
        #[arg(short, long, default_value = ManifestConfig::DEFAULT_DIR)]
        output: PathBuf,

        /// Only keep mods whose path matches this regex
        #[arg(long)]
        filter: Option<String>,

        /// Show what would be written without touching the disk
        #[arg(long)]
        dry_run: bool,

        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Check for new upstream versions and update manifests
    Autoupdate {
        /// Manifest file or directory
        #[arg(default_value = ManifestConfig::DEFAULT_DIR)]
        target: PathBuf,

        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Check that download and icon URLs are reachable
    CheckUrls {
        /// Manifest file or directory
        #[arg(default_value = ManifestConfig::DEFAULT_DIR)]
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging; stdout is reserved for reports
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let success = match args.command {
        Command::Validate { target, quiet } => commands::validate(&target, quiet)?,
        Command::Fetch {
            url,
            output,
            filter,
            dry_run,
            token,
        } => {
            let options = commands::FetchOptions {
                url,
                output,
                filter,
                dry_run,
                token,
            };
            commands::fetch(&options).await?
        }
        Command::Autoupdate { target, token } => commands::autoupdate(&target, token).await?,
        Command::CheckUrls { target } => commands::check_urls(&target).await?,
    };

    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_manifest_dir() {
        let args = Args::try_parse_from(["bn-registry", "validate", "-q"]).unwrap();
        match args.command {
            Command::Validate { target, quiet } => {
                assert_eq!(target, PathBuf::from("manifests"));
                assert!(quiet);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fetch_options() {
        let args = Args::try_parse_from([
            "bn-registry",
            "--debug",
            "fetch",
            "owner/repo",
            "-o",
            "out",
            "--filter",
            "^mods/",
            "--dry-run",
            "--token",
            "secret",
        ])
        .unwrap();

        assert!(args.debug);
        match args.command {
            Command::Fetch {
                url,
                output,
                filter,
                dry_run,
                token,
            } => {
                assert_eq!(url, "owner/repo");
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(filter.as_deref(), Some("^mods/"));
                assert!(dry_run);
                assert_eq!(token.as_deref(), Some("secret"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_check_urls_subcommand_name() {
        let args = Args::try_parse_from(["bn-registry", "check-urls", "m/x.yaml"]).unwrap();
        assert!(matches!(args.command, Command::CheckUrls { .. }));
    }
}
