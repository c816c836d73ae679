use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::collect::CollectOptions;
use crate::github::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-harvester.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GitHub token not found: set github.token in the config file or GITHUB_TOKEN")]
    MissingToken,

    #[error("No repository given: pass OWNER/REPO or set github.repository in the config file")]
    MissingRepository,

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Top-level configuration loaded from .pr-harvester.toml.
///
/// Every field has a default, so the tool runs with zero config as long as a
/// repository and token are supplied some other way.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API base, e.g. for GitHub Enterprise
    pub api_url: String,
    /// `owner/repo` or a github.com repository URL
    pub repository: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            repository: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// JSONL output file, also the resume state
    pub output: PathBuf,
    pub max_prs: usize,
    pub workers: usize,
    pub per_page: u32,
}

impl Default for CollectConfig {
    fn default() -> Self {
        let defaults = CollectOptions::default();
        Self {
            output: PathBuf::from("merged_prs.jsonl"),
            max_prs: defaults.max_prs,
            workers: defaults.workers,
            per_page: defaults.per_page,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            retries: defaults.retries,
            delay_secs: defaults.delay.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from .pr-harvester.toml in the
    /// current directory when no path is given.
    ///
    /// A missing default file yields the default config; an explicitly named
    /// file must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)?
                } else {
                    Config::default()
                }
            }
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Result<String, ConfigError> {
        self.github
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .ok_or(ConfigError::MissingToken)
    }

    pub fn repository(&self) -> Result<&str, ConfigError> {
        self.github
            .repository
            .as_deref()
            .ok_or(ConfigError::MissingRepository)
    }

    /// Check ranges the collector relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collect.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "collect.workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(1..=100).contains(&self.collect.per_page) {
            return Err(ConfigError::Invalid {
                key: "collect.per_page",
                reason: format!("{} is outside 1..=100", self.collect.per_page),
            });
        }
        if self.retry.retries == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.retries",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry.retries,
            delay: Duration::from_secs(self.retry.delay_secs),
        }
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            max_prs: self.collect.max_prs,
            workers: self.collect.workers,
            per_page: self.collect.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.collect.max_prs, 2000);
        assert_eq!(config.collect.workers, 5);
        assert_eq!(config.collect.output, PathBuf::from("merged_prs.jsonl"));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
repository = "laravel/framework"

[collect]
max_prs = 50
output = "out.jsonl"

[retry]
delay_secs = 1
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.repository().unwrap(), "laravel/framework");
        assert_eq!(config.collect.max_prs, 50);
        assert_eq!(config.collect.workers, 5);
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.retry_policy().delay, Duration::from_secs(1));
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[github]\ntoken = \"abc\"\n").unwrap();
        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.github_token().unwrap(), "abc");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(dir.path().join("nope.toml").as_path()));
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_missing_repository() {
        let config = Config::default();
        assert!(matches!(config.repository(), Err(ConfigError::MissingRepository)));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = Config::default();
        config.collect.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collect.per_page = 500;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.retries = 0;
        assert!(config.validate().is_err());
    }
}
