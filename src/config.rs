//! Configuration file handling.
//!
//! This module handles loading configuration from `.bookmarkd.toml` files
//! and merging it with command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".bookmarkd.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source-control settings.
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Dataset cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Schema validation policy.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Webhook settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// How file contents are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Authenticated files API returning base64 content.
    #[default]
    Api,
    /// Direct `/-/raw/` URL.
    Raw,
}

/// GitLab connection and traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// Base URL of the GitLab instance.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Token sent as a bearer credential.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Group whose projects (including nested subgroups) hold bookmark data.
    #[serde(default)]
    pub root_group_id: Option<String>,

    /// Additional groups expanded like the root group.
    #[serde(default)]
    pub groups: Vec<String>,

    /// Individual projects (id or path) always included.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Branch or ref to read.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Directory inside each repository holding bookmark files.
    #[serde(default)]
    pub data_path: String,

    /// File extensions to include (without dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Content retrieval strategy.
    #[serde(default)]
    pub fetch_strategy: FetchStrategy,

    /// Per-request timeout in seconds. Values below one second are raised to one.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of concurrent requests against the API.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Page size for list endpoints.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            access_token: None,
            root_group_id: None,
            groups: Vec::new(),
            projects: Vec::new(),
            branch: default_branch(),
            data_path: String::new(),
            extensions: default_extensions(),
            fetch_strategy: FetchStrategy::default(),
            timeout_seconds: default_timeout(),
            max_in_flight: default_max_in_flight(),
            per_page: default_per_page(),
        }
    }
}

impl GitLabConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

fn default_api_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["yml".to_string(), "yaml".to_string()]
}

fn default_timeout() -> u64 {
    30
}

fn default_max_in_flight() -> usize {
    8
}

fn default_per_page() -> u32 {
    100
}

/// Dataset cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Keep aggregated datasets between requests.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds before a cached dataset expires. 0 means never.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Seconds between scheduled invalidations. 0 disables the timer.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl(),
            refresh_interval_seconds: default_refresh_interval(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0)
            .then(|| Duration::from_secs(self.refresh_interval_seconds))
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

/// Schema validation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Fail the aggregation when any file violates the schema.
    #[serde(default)]
    pub strict: bool,
}

/// Webhook settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret expected in the provider token header.
    #[serde(default)]
    pub secret_token: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Populate the cache once at startup.
    #[serde(default = "default_true")]
    pub warm_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            warm_on_startup: true,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or through their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.gitlab_url {
            self.gitlab.api_url = url.clone();
        }
        if let Some(ref token) = args.token {
            self.gitlab.access_token = Some(token.clone());
        }
        if let Some(ref group) = args.root_group {
            self.gitlab.root_group_id = Some(group.clone());
        }
        if let Some(ref projects) = args.projects {
            self.gitlab.projects = projects.clone();
        }
        if let Some(ref branch) = args.branch {
            self.gitlab.branch = branch.clone();
        }
        if let Some(ref path) = args.data_path {
            self.gitlab.data_path = path.clone();
        }
        if let Some(ref extensions) = args.extensions {
            self.gitlab.extensions = extensions.clone();
        }
        if let Some(strategy) = args.fetch_strategy {
            self.gitlab.fetch_strategy = strategy;
        }
        if let Some(concurrency) = args.concurrency {
            self.gitlab.max_in_flight = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.gitlab.timeout_seconds = timeout;
        }
        if let Some(ttl) = args.cache_ttl {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(ref secret) = args.webhook_secret {
            self.webhook.secret_token = Some(secret.clone());
        }
        if let Some(ref bind) = args.bind {
            self.server.bind = bind.clone();
        }

        // Flags only ever tighten
        if args.strict_schema {
            self.validation.strict = true;
        }
        if args.no_warm {
            self.server.warm_on_startup = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gitlab.branch, "main");
        assert_eq!(config.gitlab.extensions, vec!["yml", "yaml"]);
        assert_eq!(config.gitlab.fetch_strategy, FetchStrategy::Api);
        assert!(config.gitlab.root_group_id.is_none());
        assert!(config.cache.enabled);
        assert!(!config.validation.strict);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[gitlab]
api_url = "https://gitlab.example.com"
root_group_id = "1234"
projects = ["team/links"]
branch = "develop"
data_path = "bookmarks"
fetch_strategy = "raw"
max_in_flight = 4

[cache]
ttl_seconds = 0

[validation]
strict = true

[webhook]
secret_token = "s3cret"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.gitlab.api_url, "https://gitlab.example.com");
        assert_eq!(config.gitlab.root_group_id.as_deref(), Some("1234"));
        assert_eq!(config.gitlab.projects, vec!["team/links"]);
        assert_eq!(config.gitlab.branch, "develop");
        assert_eq!(config.gitlab.data_path, "bookmarks");
        assert_eq!(config.gitlab.fetch_strategy, FetchStrategy::Raw);
        assert_eq!(config.gitlab.max_in_flight, 4);
        assert_eq!(config.gitlab.per_page, 100);
        assert_eq!(config.cache.ttl(), None);
        assert!(config.validation.strict);
        assert_eq!(config.webhook.secret_token.as_deref(), Some("s3cret"));
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gitlab]\nroot_group_id = \"77\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.gitlab.root_group_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gitlab\nroot_group_id = ").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[gitlab]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[server]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.gitlab.branch, "main");
    }

    #[test]
    fn test_cli_arguments_override_file() {
        use clap::Parser;

        let mut config: Config = toml::from_str(
            "[gitlab]\nroot_group_id = \"1\"\nbranch = \"develop\"\n\n[server]\nbind = \"127.0.0.1:1\"\n",
        )
        .unwrap();
        let args = crate::cli::Args::parse_from([
            "bookmarkd",
            "--root-group",
            "2",
            "--projects",
            "a,b",
            "--cache-ttl",
            "60",
            "--strict-schema",
            "--no-warm",
        ]);

        config.merge_with_args(&args);
        assert_eq!(config.gitlab.root_group_id.as_deref(), Some("2"));
        assert_eq!(config.gitlab.projects, vec!["a", "b"]);
        assert_eq!(config.gitlab.branch, "develop");
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.server.bind, "127.0.0.1:1");
        assert!(config.validation.strict);
        assert!(!config.server.warm_on_startup);
    }

    #[test]
    fn test_durations() {
        let cache = CacheConfig::default();
        assert_eq!(cache.ttl(), Some(Duration::from_secs(3600)));

        let disabled = CacheConfig {
            refresh_interval_seconds: 0,
            ..CacheConfig::default()
        };
        assert_eq!(disabled.refresh_interval(), None);
    }

    #[test]
    fn test_zero_timeout_in_file_is_raised() {
        let config: Config = toml::from_str("[gitlab]\ntimeout_seconds = 0\n").unwrap();
        assert_eq!(config.gitlab.timeout(), Duration::from_secs(1));
        assert_eq!(GitLabConfig::default().timeout(), Duration::from_secs(default_timeout()));
    }
}
