use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-etl.toml";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = "pr-etl";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-etl.toml.
///
/// All fields are optional, the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Where raw snapshots and CSV output live
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,

    /// Base URL of the REST API (GitHub Enterprise installs differ)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Sent as User-Agent, which GitHub rejects requests without
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data").join("raw")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data").join("processed")
}

impl Config {
    /// Load configuration from `path`.
    /// Returns default config if the file doesn't exist, then fills the
    /// token from GITHUB_TOKEN when the file left it unset or blank.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        config.github.token = resolve_token(
            config.github.token.as_deref(),
            std::env::var("GITHUB_TOKEN").ok(),
        );

        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var. Blank values count as unset.
    pub fn github_token(&self) -> Option<String> {
        resolve_token(
            self.github.token.as_deref(),
            std::env::var("GITHUB_TOKEN").ok(),
        )
    }
}

/// First non-blank of the file token and the env token.
fn resolve_token(file_token: Option<&str>, env_token: Option<String>) -> Option<String> {
    file_token
        .map(str::to_string)
        .filter(|token| !token.trim().is_empty())
        .or_else(|| env_token.filter(|token| !token.trim().is_empty()))
}
