//! Configuration management for azscale
//!
//! Optional defaults for the scaling commands, stored in TOML. Command-line
//! flags win over environment variables, which win over the file.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{ConfigError, Result};

/// Public Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Subscription used when neither `--subscription-id` nor
    /// `AZURE_SUBSCRIPTION_ID` is given
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Try the Azure CLI login before service-principal credentials
    #[serde(default)]
    pub prefer_az_cli: bool,
    /// Resource Manager base URL (sovereign clouds, test servers)
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    /// Long-running operation polling
    #[serde(default)]
    pub wait: WaitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscription_id: None,
            prefer_az_cli: false,
            management_endpoint: default_management_endpoint(),
            wait: WaitConfig::default(),
        }
    }
}

/// Polling settings for `--wait` style updates
#[derive(Debug, Clone, Deserialize)]
pub struct WaitConfig {
    /// Give up waiting after this many seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between status polls
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        // Expand environment variables in the config content
        let expanded_content = Self::expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let endpoint = self.management_endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "management_endpoint".to_string(),
                message: format!("'{}' is not an http(s) URL", endpoint),
            });
        }
        if self.wait.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "wait.timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the path to the configuration file
    ///
    /// On macOS, supports both the standard macOS path and Linux-style ~/.config path:
    /// 1. Check ~/.config/azscale/config.toml (Linux-style, preferred for cross-platform consistency)
    /// 2. Fall back to ~/Library/Application Support/com.azscale.azscale/config.toml (macOS standard)
    ///
    /// On Linux: ~/.config/azscale/config.toml
    /// On Windows: %APPDATA%\azscale\azscale\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("azscale")
                    .join("config.toml");

                if linux_style_path
                    .parent()
                    .map(|p| p.exists())
                    .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("com", "azscale", "azscale").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand environment variables in configuration content
    ///
    /// Supports `${VAR}` and `${VAR:-default}`; unknown variables are left as-is.
    ///
    /// ```toml
    /// subscription_id = "${AZSCALE_SUBSCRIPTION:-00000000-0000-0000-0000-000000000000}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

fn default_management_endpoint() -> String {
    DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_interval_secs() -> u64 {
    10
}
