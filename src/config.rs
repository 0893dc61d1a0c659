//! Configuration types for repo-collector
//!
//! Every component receives its settings explicitly at construction time.
//! All fields have defaults, so an empty JSON object is a valid config file.

use crate::error::{Error, Result};
use crate::workspace::is_plain_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Search API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the forge API (default: "https://api.github.com")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Results requested per page (default: 100, the API maximum)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard ceiling on the number of page requests (default: 10)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Timeout applied to every page request (default: 10s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Value sent in the `User-Agent` header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retrieval settings for a single fetch task
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Path to the git executable (auto-detected from PATH if None)
    #[serde(default)]
    pub git_path: Option<PathBuf>,

    /// Wall-clock bound for one clone (default: 180s)
    #[serde(default = "default_clone_timeout", with = "duration_serde")]
    pub clone_timeout: Duration,

    /// History depth passed to the clone (default: 1)
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Remove the `.git` directory after a successful clone (default: true)
    #[serde(default = "default_true")]
    pub strip_metadata: bool,

    /// Clone URLs starting with this prefix get the credential injected
    #[serde(default = "default_auth_prefix")]
    pub auth_url_prefix: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            git_path: None,
            clone_timeout: default_clone_timeout(),
            depth: default_depth(),
            strip_metadata: true,
            auth_url_prefix: default_auth_prefix(),
        }
    }
}

/// Worker pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent fetch workers (default: 8)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Output locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory receiving the archive (default: "./repo_collector_downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Name of the scratch directory created under `output_dir`
    #[serde(default = "default_workspace_name")]
    pub workspace_name: String,

    /// File name of the manifest written into the workspace
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Pack the workspace into a zip archive (default: true)
    #[serde(default = "default_true")]
    pub archive: bool,

    /// Leave the workspace on disk after archiving (default: false)
    #[serde(default)]
    pub keep_workspace: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workspace_name: default_workspace_name(),
            manifest_name: default_manifest_name(),
            archive: true,
            keep_workspace: false,
        }
    }
}

impl WorkspaceConfig {
    /// Full path of the scratch workspace
    pub fn workspace_dir(&self) -> PathBuf {
        self.output_dir.join(&self.workspace_name)
    }
}

/// Main configuration for the collector
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Search API settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Per-task retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Output locations
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 || self.search.page_size > 100 {
            return Err(Error::config(
                "search.page_size",
                format!("must be between 1 and 100, got {}", self.search.page_size),
            ));
        }
        if self.search.max_pages == 0 {
            return Err(Error::config("search.max_pages", "must be at least 1"));
        }
        if self.search.request_timeout.is_zero() {
            return Err(Error::config("search.request_timeout", "must be non-zero"));
        }
        if self.fetch.clone_timeout.is_zero() {
            return Err(Error::config("fetch.clone_timeout", "must be non-zero"));
        }
        if self.fetch.depth == 0 {
            return Err(Error::config("fetch.depth", "must be at least 1"));
        }
        if self.pool.workers == 0 {
            return Err(Error::config("pool.workers", "must be at least 1"));
        }
        for (key, name) in [
            ("workspace.workspace_name", &self.workspace.workspace_name),
            ("workspace.manifest_name", &self.workspace.manifest_name),
        ] {
            if !is_plain_name(name) {
                return Err(Error::config(
                    key,
                    format!("must be a plain file name, got {name:?}"),
                ));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("repo-collector/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_clone_timeout() -> Duration {
    Duration::from_secs(180) // 3 minutes
}

fn default_depth() -> u32 {
    1
}

fn default_auth_prefix() -> String {
    "https://github.com/".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./repo_collector_downloads")
}

fn default_workspace_name() -> String {
    "temp_repos".to_string()
}

fn default_manifest_name() -> String {
    "_SEARCH_REPORT.txt".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
