use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::{Platform, PlatformError};
use crate::badge::BadgeState;
use crate::config::{Config, GitHubConfig, Settings};

/// Plain fallback: in-memory config, badge kept in memory, URLs printed.
#[derive(Default)]
pub struct HeadlessPlatform {
    settings: Settings,
    config: Mutex<Option<GitHubConfig>>,
    badges: Mutex<Vec<BadgeState>>,
    opened: Mutex<Vec<String>>,
}

impl HeadlessPlatform {
    pub fn new(config: Option<GitHubConfig>, settings: Settings) -> Self {
        Self {
            settings,
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Seed credentials from `GITHUB_USER` / `GITHUB_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(
            std::env::var("GITHUB_TOKEN").ok(),
            std::env::var("GITHUB_USER").ok(),
        );
        Self::new(config.github, config.settings)
    }

    pub fn last_badge(&self) -> Option<BadgeState> {
        self.badges.lock().ok().and_then(|b| b.last().cloned())
    }

    /// Every badge published so far, oldest first.
    pub fn badge_history(&self) -> Vec<BadgeState> {
        self.badges.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Platform for HeadlessPlatform {
    fn name(&self) -> &str {
        "headless"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn get_config(&self) -> Result<Option<GitHubConfig>, PlatformError> {
        Ok(self.config.lock().ok().and_then(|c| c.clone()))
    }

    async fn set_config(&self, config: &GitHubConfig) -> Result<(), PlatformError> {
        if let Ok(mut current) = self.config.lock() {
            *current = Some(config.clone());
        }
        Ok(())
    }

    async fn set_badge(&self, badge: &BadgeState) {
        info!(text = %badge.text, color = %badge.color, "badge updated");
        if let Ok(mut badges) = self.badges.lock() {
            badges.push(badge.clone());
        }
    }

    async fn open_tab(&self, url: &str) -> Result<(), PlatformError> {
        println!("{}", url);
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        Ok(())
    }
}
