use thiserror::Error;
use tracing::{info, instrument};

use crate::config::GitHubConfig;
use crate::github::{GitHubClient, GitHubError};
use crate::platform::{Platform, PlatformError};

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Please provide a GitHub token")]
    MissingToken,

    #[error("Please provide a username when skipping token verification")]
    MissingUsername,

    #[error("Invalid token or network error. Please check your token and try again.")]
    Verification(#[source] GitHubError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Validate a token, resolve the username it belongs to, and store both.
///
/// With `verify` off the token is stored as given and `username` is required.
#[instrument(skip(platform, token))]
pub async fn configure(
    platform: &dyn Platform,
    token: &str,
    username: Option<&str>,
    verify: bool,
) -> Result<GitHubConfig, OptionsError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(OptionsError::MissingToken);
    }

    let username = if verify {
        let settings = platform.settings();
        let client = GitHubClient::new(&settings.api_url, token, settings.request_timeout())
            .map_err(OptionsError::Verification)?;
        client.current_user().await.map_err(OptionsError::Verification)?
    } else {
        match username.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(OptionsError::MissingUsername),
        }
    };

    let config = GitHubConfig::new(username, token);
    platform.set_config(&config).await?;
    info!(username = %config.username, "configuration saved");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::platform::HeadlessPlatform;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn platform(server: &MockServer) -> HeadlessPlatform {
        HeadlessPlatform::new(
            None,
            Settings {
                api_url: server.uri(),
                ..Settings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_blank_token_rejected_without_saving() {
        let server = MockServer::start().await;
        let platform = platform(&server);
        let result = configure(&platform, "   ", Some("alice"), true).await;
        assert!(matches!(result, Err(OptionsError::MissingToken)));
        assert!(platform.get_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_comes_from_token_owner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "TOKEN good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "login": "octocat" })))
            .mount(&server)
            .await;

        let platform = platform(&server);
        let saved = configure(&platform, "good", Some("ignored"), true).await.unwrap();
        assert_eq!(saved, GitHubConfig::new("octocat", "good"));
        assert_eq!(platform.get_config().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_rejected_token_is_not_saved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let platform = platform(&server);
        let err = configure(&platform, "bad", None, true).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid token or network error. Please check your token and try again."
        );
        assert!(platform.get_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unverified_requires_username() {
        let server = MockServer::start().await;
        let platform = platform(&server);
        assert!(matches!(
            configure(&platform, "t", None, false).await,
            Err(OptionsError::MissingUsername)
        ));
        let saved = configure(&platform, "t", Some("alice"), false).await.unwrap();
        assert_eq!(saved.username, "alice");
    }
}
