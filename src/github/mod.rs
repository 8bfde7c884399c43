pub mod types;

pub use types::{Author, PullRequest, PullRequestDetail, Repository, SearchItem, SearchResponse};

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use thiserror::Error;
use tracing::{debug, instrument};

use types::ApiUser;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "pr-badge";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Pull request {0} has no head repository")]
    MissingRepository(String),
}

/// Thin client over the three GitHub endpoints we use.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(AUTHORIZATION, format!("TOKEN {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// Search open pull requests the user is involved in (author, assignee,
    /// mentioned, commented or requested reviewer).
    #[instrument(skip(self))]
    pub async fn search_involved(&self, username: &str) -> Result<SearchResponse, GitHubError> {
        let url = format!("{}/search/issues", self.api_url);
        let query = format!("involves:{} state:open type:pr", username);

        debug!(%url, "searching pull requests");
        let response = self
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        debug!(total = response.total_count, items = response.items.len(), "search complete");
        Ok(response)
    }

    /// Fetch the detail resource an item's `pull_request.url` points at.
    #[instrument(skip(self))]
    pub async fn pull_request_detail(&self, url: &str) -> Result<PullRequestDetail, GitHubError> {
        let detail = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<PullRequestDetail>()
            .await?;
        Ok(detail)
    }

    /// Resolve the account owning the token.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<String, GitHubError> {
        let url = format!("{}/user", self.api_url);
        let user = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiUser>()
            .await?;
        Ok(user.login)
    }
}
