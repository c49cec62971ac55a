//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset here fall back to the
//! configuration file.

use crate::config::FetchStrategy;
use clap::Parser;
use std::path::PathBuf;

/// bookmarkd - bookmark aggregation service for GitLab groups
///
/// Collects bookmark YAML files from every project of a GitLab group,
/// validates and merges them, and serves the result over HTTP.
///
/// Examples:
///   bookmarkd --root-group 1234 --token $GITLAB_TOKEN
///   bookmarkd --root-group 1234 --data-path bookmarks --bind 127.0.0.1:9000
///   bookmarkd --projects team/links,team/docs --once --format json
///   bookmarkd --root-group 1234 --dry-run
///   bookmarkd --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// GitLab instance URL
    #[arg(long, value_name = "URL", env = "GITLAB_URL")]
    pub gitlab_url: Option<String>,

    /// Access token sent as a bearer token
    #[arg(long, value_name = "TOKEN", env = "GITLAB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Root group whose projects (nested subgroups included) are aggregated
    #[arg(short = 'g', long, value_name = "ID", env = "GITLAB_ROOT_GROUP")]
    pub root_group: Option<String>,

    /// Fallback project ids or paths (comma-separated)
    ///
    /// Example: --projects team/links,42
    #[arg(long, value_name = "PROJECTS", value_delimiter = ',')]
    pub projects: Option<Vec<String>>,

    /// Branch or tag to read the data files from
    #[arg(short, long, value_name = "REF")]
    pub branch: Option<String>,

    /// Directory inside each repository holding the data files
    #[arg(long, value_name = "PATH")]
    pub data_path: Option<String>,

    /// Data file extensions (comma-separated)
    ///
    /// Example: --extensions yml,yaml
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// How file contents are retrieved (api, raw)
    #[arg(long, value_name = "STRATEGY")]
    pub fetch_strategy: Option<FetchStrategy>,

    /// Maximum number of in-flight GitLab requests
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Cache time-to-live in seconds (0 keeps data until invalidated)
    #[arg(long, value_name = "SECS")]
    pub cache_ttl: Option<u64>,

    /// Shared secret expected in the webhook token header
    #[arg(long, value_name = "SECRET", env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Address the HTTP server listens on
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Treat schema violations as fatal
    #[arg(long)]
    pub strict_schema: bool,

    /// Do not populate the cache when the server starts
    #[arg(long)]
    pub no_warm: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .bookmarkd.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the data files that would be fetched and exit
    #[arg(long, conflicts_with = "once")]
    pub dry_run: bool,

    /// Aggregate once, write a report and exit instead of serving
    ///
    /// Exit code 2 when the aggregation fails (e.g. duplicate URLs).
    #[arg(long)]
    pub once: bool,

    /// Report format for --once (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Report file for --once
    #[arg(
        short,
        long,
        default_value = "bookmarks_report.md",
        value_name = "FILE"
    )]
    pub output: PathBuf,

    /// Generate a default .bookmarkd.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.gitlab_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("GitLab URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if let Some(ref bind) = self.bind {
            if bind.parse::<std::net::SocketAddr>().is_err() {
                return Err(format!("Invalid bind address: {}", bind));
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
