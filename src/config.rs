use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::github::DEFAULT_API_URL;

const APP_NAME: &str = "pr-badge";
const CONFIG_FILE: &str = "config.toml";

/// Alarm granularity floor; shorter periods are raised to this.
pub const MIN_REFRESH_PERIOD_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to write config file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Credentials for the GitHub account being watched.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

impl GitHubConfig {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Both fields must be non-empty for any network call to happen.
    pub fn is_configured(&self) -> bool {
        !self.username.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("username", &self.username)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the REST API; point at a GitHub Enterprise host if needed
    pub api_url: String,
    pub refresh_period_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            refresh_period_secs: MIN_REFRESH_PERIOD_SECS,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs.max(MIN_REFRESH_PERIOD_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Stored under a fixed key; absent until the options flow has run
    #[serde(default, rename = "github_config", skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfig>,

    #[serde(default)]
    pub settings: Settings,
}

impl Config {
    /// Fill gaps from `GITHUB_TOKEN` / `GITHUB_USER`. File values win.
    pub fn apply_env(&mut self, token: Option<String>, username: Option<String>) {
        if token.is_none() && username.is_none() {
            return;
        }
        let github = self.github.get_or_insert_with(GitHubConfig::default);
        if github.token.is_empty() {
            if let Some(token) = token {
                github.token = token;
            }
        }
        if github.username.is_empty() {
            if let Some(username) = username {
                github.username = username;
            }
        }
    }
}

/// File-backed persistence for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/pr-badge/config.toml` on Linux, the platform equivalent elsewhere.
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(base.join(APP_NAME).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, falling back to defaults when the file is missing,
    /// then fill gaps from the environment.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = self.load_file()?;
        config.apply_env(
            std::env::var("GITHUB_TOKEN").ok(),
            std::env::var("GITHUB_USER").ok(),
        );
        Ok(config)
    }

    /// Load without consulting the environment.
    pub fn load_file(&self) -> Result<Config, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Replace the whole file. Written to a sibling and renamed into place so a
    /// concurrent reader sees either the old or the new config.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        let write_err = |source: std::io::Error| ConfigError::FileWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, contents).map_err(write_err)?;
        // Holds the token: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
        }
        fs::rename(&staging, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}
