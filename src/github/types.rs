use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of `GET /search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

/// A pull request as it appears in the search results.
/// Lacks the repository, draft flag and true creation timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub pull_request: PullRequestLink,
    #[serde(default)]
    pub user: Option<ApiUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLink {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Response of `GET /repos/{owner}/{repo}/pulls/{number}`, trimmed to what we display.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetail {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub draft: bool,
    pub head: Head,
    pub user: ApiUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    /// `None` when the source fork has been deleted.
    #[serde(default)]
    pub repo: Option<ApiRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    pub id: u64,
    pub name: String,
}

/// A pull request ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub id: u64,
    pub title: String,
    /// Display number, e.g. `#42`
    pub number: String,
    /// Relative age, e.g. `3 days ago`
    pub created_at: String,
    pub url: String,
    pub repository: Repository,
    pub opened_by: Author,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    pub avatar: String,
}
