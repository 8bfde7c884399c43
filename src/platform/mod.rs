pub mod desktop;
pub mod headless;

pub use desktop::DesktopPlatform;
pub use headless::HeadlessPlatform;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::badge::BadgeState;
use crate::config::{ConfigError, ConfigStore, GitHubConfig, Settings};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open {url}: {source}")]
    Open {
        url: String,
        source: std::io::Error,
    },
}

/// What the host environment provides: config persistence, the badge, and a browser.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Non-credential settings, fixed at startup.
    fn settings(&self) -> &Settings;

    /// Stored credentials, or `None` before the options flow has run.
    async fn get_config(&self) -> Result<Option<GitHubConfig>, PlatformError>;

    /// Replace the stored credentials wholesale.
    async fn set_config(&self, config: &GitHubConfig) -> Result<(), PlatformError>;

    async fn set_badge(&self, badge: &BadgeState);

    async fn open_tab(&self, url: &str) -> Result<(), PlatformError>;
}

/// Pick the platform once at startup. Falls back to the headless one when no
/// config directory exists.
pub fn select(headless: bool, config_path: Option<PathBuf>) -> Arc<dyn Platform> {
    if headless {
        info!("using headless platform");
        return Arc::new(HeadlessPlatform::from_env());
    }

    let store = match config_path {
        Some(path) => ConfigStore::new(path),
        None => match ConfigStore::default_location() {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "falling back to headless platform");
                return Arc::new(HeadlessPlatform::from_env());
            }
        },
    };

    info!(config = %store.path().display(), "using desktop platform");
    Arc::new(DesktopPlatform::new(store))
}
