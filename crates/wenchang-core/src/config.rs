//! Configuration management.
//!
//! Holds the remote repository coordinates, the local static data path and
//! every retry, batching and cache constant the data layer uses.
//!
//! Configuration is stored at `~/.config/wenchang/config.json`. A missing
//! file yields the defaults; missing fields inside a file take their
//! default values too.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "wenchang";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default cache time-to-live: 5 minutes.
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repo: RepoConfig,
    /// Directory holding the static fallback files (`cases_summary.json`, ...)
    pub local_data_path: PathBuf,
    pub retry: RetryPolicy,
    pub batch: BatchConfig,
    pub cache_ttl_ms: u64,
    /// Persist directory listings in the cache dir between runs.
    pub persist_listings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: RepoConfig::default(),
            local_data_path: PathBuf::from("data"),
            retry: RetryPolicy::default(),
            batch: BatchConfig::default(),
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            persist_listings: false,
        }
    }
}

/// Location of the GitHub-hosted dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Contents API root, e.g. `https://api.github.com/repos/{owner}/{repo}`
    pub api_base_url: String,
    /// Raw file root, e.g. `https://raw.githubusercontent.com/{owner}/{repo}/{branch}`
    pub raw_base_url: String,
    /// Directory inside the repo holding the aggregate collection files
    pub data_dir: String,
    pub cases_path: String,
    pub policies_path: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        let owner = "alandan97";
        let repo = "wenchang-data";
        let branch = "main";
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            api_base_url: format!("https://api.github.com/repos/{}/{}", owner, repo),
            raw_base_url: format!(
                "https://raw.githubusercontent.com/{}/{}/{}",
                owner, repo, branch
            ),
            data_dir: "data".to_string(),
            cases_path: "cases".to_string(),
            policies_path: "policies".to_string(),
        }
    }
}

impl RepoConfig {
    /// Path of an aggregate file inside the configured data directory.
    pub fn data_file_path(&self, file_name: &str) -> String {
        let dir = self.data_dir.trim_matches('/');
        if dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", dir, file_name)
        }
    }
}

/// Retry ceiling and backoff multipliers for a single GET.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base wait after a rate-limit answer, multiplied by the attempt index.
    pub rate_limit_delay_ms: u64,
    /// Base wait after any other failure, multiplied by the attempt index.
    pub error_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delay_ms: 1000,
            error_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms * u64::from(attempt))
    }

    pub fn error_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.error_delay_ms * u64::from(attempt))
    }
}

/// Pacing for directory listings and batched downloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Start offset between items inside one batch.
    pub item_stagger_ms: u64,
    /// Pause between two batches.
    pub batch_pause_ms: u64,
    pub listing_page_size: usize,
    /// Insert a cooldown after this many listing pages.
    pub listing_cooldown_every: usize,
    pub listing_cooldown_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            item_stagger_ms: 50,
            batch_pause_ms: 300,
            listing_page_size: 100,
            listing_cooldown_every: 5,
            listing_cooldown_ms: 1000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir
            .join(APP_NAME)
            .join(format!("{}-{}", self.repo.owner, self.repo.repo)))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
