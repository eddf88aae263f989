//! Configuration management for proptax
//!
//! All configuration is loaded from `./config/proptax.toml`.
//! Defaults live in the config template, not in source code.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/proptax.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/proptax.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    ZeroValue { field: String },

    #[error("timing.poll_interval_ms ({poll_ms}) must be shorter than '{field}' ({timeout_ms})")]
    PollTooSlow {
        field: String,
        poll_ms: u64,
        timeout_ms: u64,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub http: HttpConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Tax portal location and page layout
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub search_url: String,
    pub delinquent_marker: String,
    pub selectors: SelectorConfig,
}

/// CSS selectors for the elements the pipeline reads or drives
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    pub search_input: String,
    pub result_row: String,
    pub empty_result_row: String,
    pub account_title: String,
    pub totals_table: String,
    pub statement_link: String,
}

/// HTTP client configuration for statement downloads
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Readiness polling bounds (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    pub page_ready_timeout_ms: u64,
    pub search_ready_timeout_ms: u64,
    pub detail_ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl TimingConfig {
    pub fn page_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.page_ready_timeout_ms)
    }

    pub fn search_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.search_ready_timeout_ms)
    }

    pub fn detail_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Headless Chrome launch settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

fn default_headless() -> bool {
    true
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Fixed tax year for statement filenames; previous calendar year when unset
    #[serde(default)]
    pub tax_year: Option<i32>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.portal.search_url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            _ => {
                return Err(ConfigError::InvalidUrl {
                    field: "portal.search_url".to_string(),
                    url: self.portal.search_url.clone(),
                })
            }
        }

        require_non_empty("portal.delinquent_marker", &self.portal.delinquent_marker)?;

        let selectors = &self.portal.selectors;
        require_non_empty("portal.selectors.search_input", &selectors.search_input)?;
        require_non_empty("portal.selectors.result_row", &selectors.result_row)?;
        require_non_empty("portal.selectors.empty_result_row", &selectors.empty_result_row)?;
        require_non_empty("portal.selectors.account_title", &selectors.account_title)?;
        require_non_empty("portal.selectors.totals_table", &selectors.totals_table)?;
        require_non_empty("portal.selectors.statement_link", &selectors.statement_link)?;

        require_non_empty("http.user_agent", &self.http.user_agent)?;
        require_positive("http.request_timeout_secs", self.http.request_timeout_secs)?;

        let timing = &self.timing;
        require_positive("timing.poll_interval_ms", timing.poll_interval_ms)?;
        for (field, timeout_ms) in [
            ("timing.page_ready_timeout_ms", timing.page_ready_timeout_ms),
            ("timing.search_ready_timeout_ms", timing.search_ready_timeout_ms),
            ("timing.detail_ready_timeout_ms", timing.detail_ready_timeout_ms),
        ] {
            require_positive(field, timeout_ms)?;
            if timing.poll_interval_ms >= timeout_ms {
                return Err(ConfigError::PollTooSlow {
                    field: field.to_string(),
                    poll_ms: timing.poll_interval_ms,
                    timeout_ms,
                });
            }
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroValue {
            field: field.to_string(),
        });
    }
    Ok(())
}
