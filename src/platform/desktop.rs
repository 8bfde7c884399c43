use std::process::ExitStatus;

use async_trait::async_trait;
use colored::Colorize;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{Platform, PlatformError};
use crate::badge::{BadgeColor, BadgeState};
use crate::config::{ConfigStore, GitHubConfig, Settings};

/// Config in a TOML file, badge on the terminal, links in the system browser.
pub struct DesktopPlatform {
    store: ConfigStore,
    settings: Settings,
}

impl DesktopPlatform {
    pub fn new(store: ConfigStore) -> Self {
        let settings = match store.load_file() {
            Ok(config) => config.settings,
            Err(e) => {
                warn!(error = %e, "unreadable config, using default settings");
                Settings::default()
            }
        };
        Self { store, settings }
    }
}

#[async_trait]
impl Platform for DesktopPlatform {
    fn name(&self) -> &str {
        "desktop"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn get_config(&self) -> Result<Option<GitHubConfig>, PlatformError> {
        Ok(self.store.load()?.github)
    }

    #[instrument(skip_all, fields(username = %config.username))]
    async fn set_config(&self, config: &GitHubConfig) -> Result<(), PlatformError> {
        let mut stored = self.store.load_file()?;
        stored.github = Some(config.clone());
        self.store.save(&stored)?;
        info!("credentials saved");
        Ok(())
    }

    async fn set_badge(&self, badge: &BadgeState) {
        debug!(text = %badge.text, color = %badge.color, "badge updated");
        eprintln!("badge: {}", paint(badge));
    }

    #[instrument(skip(self))]
    async fn open_tab(&self, url: &str) -> Result<(), PlatformError> {
        launch(opener(url))
            .map(|_| ())
            .map_err(|source| PlatformError::Open {
                url: url.to_string(),
                source,
            })
    }
}

fn paint(badge: &BadgeState) -> colored::ColoredString {
    let text = if badge.text.is_empty() { " " } else { badge.text.as_str() };
    let label = format!(" {} ", text);
    let label = label.as_str();
    match badge.color {
        BadgeColor::Green => label.black().on_green(),
        BadgeColor::Orange => label.black().on_yellow(),
        BadgeColor::Red => label.white().on_red().bold(),
        BadgeColor::Gray => label.white().on_bright_black(),
    }
}

fn opener(url: &str) -> Command {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = Command::new("xdg-open");

    command.arg(url);
    command
}

/// Spawn the opener and reap it in the background so a long-running `watch`
/// does not accumulate zombies. The handle resolves to the opener's exit status.
fn launch(mut command: Command) -> std::io::Result<JoinHandle<std::io::Result<ExitStatus>>> {
    let mut child = command.spawn()?;
    debug!(pid = child.id(), "opener started");

    Ok(tokio::spawn(async move {
        let status = child.wait().await;
        match &status {
            Ok(status) if !status.success() => warn!(%status, "opener exited with failure"),
            Ok(status) => debug!(%status, "opener exited"),
            Err(e) => warn!(error = %e, "could not wait for opener"),
        }
        status
    }))
}
