pub mod age;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{GitHubConfig, Settings};
use crate::github::{
    Author, GitHubClient, GitHubError, PullRequest, PullRequestDetail, Repository, SearchItem,
};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("'{0}' is not a pull request number; expected 12, #12 or repo#12")]
    Invalid(String),

    #[error("No open pull request {0} found")]
    NotFound(String),

    #[error("#{number} exists in several repositories ({}); pick one with <repo>#{number}", .candidates.join(", "))]
    Ambiguous { number: u64, candidates: Vec<String> },
}

/// Pull requests of one repository, in the order their details resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryGroup {
    pub repository: String,
    pub pull_requests: Vec<PullRequest>,
}

/// Pull requests partitioned by repository name. Groups appear in the order
/// their first member was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedResult {
    groups: Vec<RepositoryGroup>,
}

impl GroupedResult {
    pub fn get(&self, repository: &str) -> Option<&[PullRequest]> {
        self.groups
            .iter()
            .find(|g| g.repository == repository)
            .map(|g| g.pull_requests.as_slice())
    }

    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.repository.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepositoryGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn pull_request_count(&self) -> usize {
        self.groups.iter().map(|g| g.pull_requests.len()).sum()
    }

    /// Resolve `12`, `#12` or `repo#12`. Numbers are only unique per repository,
    /// so a bare number must match exactly one pull request.
    pub fn find(&self, target: &str) -> Result<&PullRequest, LookupError> {
        let target = target.trim();
        let (repository, number) = match target.rsplit_once('#') {
            Some((repo, number)) => (Some(repo).filter(|r| !r.is_empty()), number),
            None => (None, target),
        };
        let number: u64 = number
            .parse()
            .map_err(|_| LookupError::Invalid(target.to_string()))?;

        if let Some(repository) = repository {
            return self
                .get(repository)
                .and_then(|prs| find_number(prs.iter(), number).next())
                .ok_or_else(|| LookupError::NotFound(format!("{}#{}", repository, number)));
        }

        let mut matches = self
            .groups
            .iter()
            .flat_map(|g| find_number(g.pull_requests.iter(), number).map(move |pr| (g, pr)));
        let (first_group, first) = matches
            .next()
            .ok_or_else(|| LookupError::NotFound(format!("#{}", number)))?;

        let others: Vec<String> = matches
            .map(|(g, _)| format!("{}#{}", g.repository, number))
            .collect();
        if others.is_empty() {
            return Ok(first);
        }

        let mut candidates = vec![format!("{}#{}", first_group.repository, number)];
        candidates.extend(others);
        Err(LookupError::Ambiguous { number, candidates })
    }
}

fn find_number<'a>(
    pull_requests: impl Iterator<Item = &'a PullRequest>,
    number: u64,
) -> impl Iterator<Item = &'a PullRequest> {
    let wanted = format!("#{}", number);
    pull_requests.filter(move |pr| pr.number == wanted)
}

pub fn group_by_repository(pull_requests: Vec<PullRequest>) -> GroupedResult {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<RepositoryGroup> = Vec::new();

    for pr in pull_requests {
        let name = pr.repository.name.clone();
        match index.get(&name) {
            Some(&i) => groups[i].pull_requests.push(pr),
            None => {
                index.insert(name.clone(), groups.len());
                groups.push(RepositoryGroup {
                    repository: name,
                    pull_requests: vec![pr],
                });
            }
        }
    }

    GroupedResult { groups }
}

/// Outcome of one cycle. Failures are folded in rather than returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub configured: bool,
    pub total_count: u64,
    pub grouped: GroupedResult,
    pub failed: bool,
    pub error: Option<String>,
}

impl Aggregation {
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            configured: true,
            failed: true,
            error: Some(format!("Failed to load pull requests: {}", error)),
            ..Self::default()
        }
    }
}

/// Run a full cycle for `config`. Never makes a request when unconfigured.
#[instrument(skip_all, fields(username = %config.username))]
pub async fn aggregate(config: &GitHubConfig, settings: &Settings) -> Aggregation {
    if !config.is_configured() {
        debug!("not configured, skipping fetch");
        return Aggregation::unconfigured();
    }

    let client = match GitHubClient::new(&settings.api_url, &config.token, settings.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "could not build GitHub client");
            return Aggregation::failed(e);
        }
    };

    aggregate_with(&client, &config.username, Utc::now()).await
}

/// Search, resolve every item's details concurrently, then group.
pub async fn aggregate_with(client: &GitHubClient, username: &str, now: DateTime<Utc>) -> Aggregation {
    let search = match client.search_involved(username).await {
        Ok(search) => search,
        Err(e) => {
            warn!(error = %e, "search request failed");
            return Aggregation::failed(e);
        }
    };

    let total_count = search.total_count;
    let resolved = resolve_details(client, search.items, now).await;
    let grouped = group_by_repository(resolved);

    info!(total_count, repositories = grouped.len(), "cycle resolved");
    Aggregation {
        configured: true,
        total_count,
        grouped,
        failed: false,
        error: None,
    }
}

/// Detail fetches run concurrently; the result is in completion order.
async fn resolve_details(client: &GitHubClient, items: Vec<SearchItem>, now: DateTime<Utc>) -> Vec<PullRequest> {
    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .map(|item| async move {
            let detail = client.pull_request_detail(&item.pull_request.url).await;
            match detail.and_then(|d| from_detail(d, now)) {
                Ok(pr) => pr,
                Err(e) => {
                    warn!(number = item.number, error = %e, "detail fetch failed, using search data");
                    fallback(&item)
                }
            }
        })
        .collect();

    let mut resolved = Vec::with_capacity(pending.len());
    while let Some(pr) = pending.next().await {
        resolved.push(pr);
    }
    resolved
}

fn from_detail(detail: PullRequestDetail, now: DateTime<Utc>) -> Result<PullRequest, GitHubError> {
    let repo = detail
        .head
        .repo
        .ok_or_else(|| GitHubError::MissingRepository(detail.html_url.clone()))?;

    Ok(PullRequest {
        id: detail.id,
        title: detail.title,
        number: format!("#{}", detail.number),
        created_at: age::relative_age(detail.created_at, now),
        url: detail.html_url,
        repository: Repository {
            id: repo.id,
            name: repo.name,
        },
        opened_by: Author {
            name: detail.user.login,
            avatar: detail.user.avatar_url.unwrap_or_default(),
        },
        draft: detail.draft,
    })
}

fn fallback(item: &SearchItem) -> PullRequest {
    let (name, avatar) = match &item.user {
        Some(user) => (user.login.clone(), user.avatar_url.clone().unwrap_or_default()),
        None => (UNKNOWN.to_string(), String::new()),
    };

    PullRequest {
        id: item.id,
        title: item.title.clone(),
        number: format!("#{}", item.number),
        created_at: "unknown".to_string(),
        url: item.html_url.clone().unwrap_or_default(),
        repository: Repository {
            id: 0,
            name: UNKNOWN.to_string(),
        },
        opened_by: Author { name, avatar },
        draft: false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Helper to create a resolved PullRequest for testing.
    pub fn test_pull_request(id: u64, repository: &str) -> PullRequest {
        PullRequest {
            id,
            title: format!("PR {}", id),
            number: format!("#{}", id),
            created_at: "1 day ago".to_string(),
            url: format!("https://github.com/org/{}/pull/{}", repository, id),
            repository: Repository {
                id: 1,
                name: repository.to_string(),
            },
            opened_by: Author {
                name: "alice".to_string(),
                avatar: String::new(),
            },
            draft: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn search_item(server: &MockServer, n: u64) -> serde_json::Value {
        serde_json::json!({
            "id": 100 + n,
            "number": n,
            "title": format!("Item {}", n),
            "html_url": format!("https://github.com/org/repo/pull/{}", n),
            "pull_request": { "url": format!("{}/repos/org/repo/pulls/{}", server.uri(), n) },
            "user": { "login": format!("user{}", n), "avatar_url": format!("https://avatars/{}", n) }
        })
    }

    fn detail(n: u64, repo: &str, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "id": 100 + n,
            "number": n,
            "title": format!("Item {}", n),
            "html_url": format!("https://github.com/org/{}/pull/{}", repo, n),
            "created_at": created_at,
            "draft": n == 2,
            "head": { "repo": { "id": n * 10, "name": repo } },
            "user": { "login": format!("user{}", n), "avatar_url": format!("https://avatars/{}", n) }
        })
    }

    async fn mount_search(server: &MockServer, total: u64, items: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": total,
                "items": items
            })))
            .mount(server)
            .await;
    }

    async fn mount_detail(server: &MockServer, n: u64, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/org/repo/pulls/{}", n)))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(&server.uri(), "t", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_grouping_preserves_order_within_repository() {
        let grouped = group_by_repository(vec![
            test_pull_request(1, "a"),
            test_pull_request(2, "b"),
            test_pull_request(3, "a"),
        ]);
        let names: Vec<&str> = grouped.repository_names().collect();
        assert_eq!(names, vec!["a", "b"]);
        let ids: Vec<u64> = grouped.get("a").unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(grouped.pull_request_count(), 3);
    }

    #[test]
    fn test_grouping_membership_independent_of_order() {
        let forward = vec![
            test_pull_request(1, "a"),
            test_pull_request(2, "b"),
            test_pull_request(3, "a"),
            test_pull_request(4, "c"),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let membership = |g: &GroupedResult| {
            let mut out: Vec<(String, Vec<u64>)> = g
                .iter()
                .map(|group| {
                    let mut ids: Vec<u64> = group.pull_requests.iter().map(|p| p.id).collect();
                    ids.sort();
                    (group.repository.clone(), ids)
                })
                .collect();
            out.sort();
            out
        };

        let first = group_by_repository(forward.clone());
        assert_eq!(first, group_by_repository(forward));
        assert_eq!(membership(&first), membership(&group_by_repository(backward)));
    }

    #[test]
    fn test_find_by_number() {
        let grouped = group_by_repository(vec![test_pull_request(7, "a"), test_pull_request(42, "b")]);
        assert_eq!(grouped.find("42").unwrap().id, 42);
        assert_eq!(grouped.find("#7").unwrap().id, 7);
        assert_eq!(grouped.find("b#42").unwrap().id, 42);
        assert_eq!(grouped.find("4"), Err(LookupError::NotFound("#4".to_string())));
        assert_eq!(grouped.find("a#42"), Err(LookupError::NotFound("a#42".to_string())));
        assert!(matches!(grouped.find("abc"), Err(LookupError::Invalid(_))));
        assert!(matches!(grouped.find("a#"), Err(LookupError::Invalid(_))));
    }

    #[test]
    fn test_same_number_in_two_repositories() {
        let mut first = test_pull_request(1, "repoA");
        first.number = "#12".to_string();
        let mut second = test_pull_request(2, "repoB");
        second.number = "#12".to_string();

        for prs in [vec![first.clone(), second.clone()], vec![second.clone(), first.clone()]] {
            let grouped = group_by_repository(prs);

            let err = grouped.find("12").unwrap_err();
            match &err {
                LookupError::Ambiguous { number, candidates } => {
                    assert_eq!(*number, 12);
                    let mut sorted = candidates.clone();
                    sorted.sort();
                    assert_eq!(sorted, vec!["repoA#12", "repoB#12"]);
                }
                other => panic!("expected ambiguity, got {:?}", other),
            }
            assert!(err.to_string().contains("repoA#12"));
            assert!(grouped.find("#12").is_err());

            assert_eq!(grouped.find("repoA#12").unwrap().url, "https://github.com/org/repoA/pull/1");
            assert_eq!(grouped.find("repoB#12").unwrap().url, "https://github.com/org/repoB/pull/2");
        }
    }

    #[tokio::test]
    async fn test_unconfigured_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let settings = Settings {
            api_url: server.uri(),
            ..Settings::default()
        };
        for config in [GitHubConfig::new("", "t"), GitHubConfig::new("alice", "")] {
            let result = aggregate(&config, &settings).await;
            assert!(!result.configured);
            assert!(!result.failed);
            assert_eq!(result.total_count, 0);
        }
    }

    #[tokio::test]
    async fn test_two_repositories_end_to_end() {
        let server = MockServer::start().await;
        mount_search(&server, 2, vec![search_item(&server, 1), search_item(&server, 2)]).await;
        mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(detail(1, "repoA", "2025-06-13T12:00:00Z"))).await;
        mount_detail(&server, 2, ResponseTemplate::new(200).set_body_json(detail(2, "repoB", "2025-05-01T12:00:00Z"))).await;

        let settings = Settings {
            api_url: server.uri(),
            ..Settings::default()
        };
        let result = aggregate(&GitHubConfig::new("alice", "t"), &settings).await;

        assert!(result.configured);
        assert!(!result.failed);
        assert_eq!(result.total_count, 2);
        let mut names: Vec<&str> = result.grouped.repository_names().collect();
        names.sort();
        assert_eq!(names, vec!["repoA", "repoB"]);
        assert_eq!(result.grouped.get("repoA").unwrap().len(), 1);
        assert_eq!(result.grouped.get("repoB").unwrap().len(), 1);
        assert!(result.grouped.get("repoB").unwrap()[0].draft);
    }

    #[tokio::test]
    async fn test_detail_fields_are_mapped() {
        let server = MockServer::start().await;
        mount_search(&server, 1, vec![search_item(&server, 1)]).await;
        mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(detail(1, "repoA", "2025-06-01T12:00:00Z"))).await;

        let result = aggregate_with(&client(&server), "alice", now()).await;
        let pr = &result.grouped.get("repoA").unwrap()[0];
        assert_eq!(pr.id, 101);
        assert_eq!(pr.number, "#1");
        assert_eq!(pr.created_at, "2 weeks ago");
        assert_eq!(pr.url, "https://github.com/org/repoA/pull/1");
        assert_eq!(pr.repository, Repository { id: 10, name: "repoA".to_string() });
        assert_eq!(pr.opened_by.name, "user1");
        assert_eq!(pr.opened_by.avatar, "https://avatars/1");
    }

    #[tokio::test]
    async fn test_single_detail_failure_degrades_item() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            3,
            vec![search_item(&server, 1), search_item(&server, 2), search_item(&server, 3)],
        )
        .await;
        mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(detail(1, "repoA", "2025-06-14T12:00:00Z"))).await;
        mount_detail(&server, 2, ResponseTemplate::new(500)).await;
        mount_detail(&server, 3, ResponseTemplate::new(200).set_body_json(detail(3, "repoA", "2025-06-14T12:00:00Z"))).await;

        let result = aggregate_with(&client(&server), "alice", now()).await;
        assert!(!result.failed);
        assert_eq!(result.grouped.pull_request_count(), 3);

        let unknown = result.grouped.get("Unknown").unwrap();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].id, 102);
        assert_eq!(unknown[0].title, "Item 2");
        assert_eq!(unknown[0].url, "https://github.com/org/repo/pull/2");
        assert_eq!(unknown[0].opened_by.name, "user2");
        assert_eq!(unknown[0].created_at, "unknown");
        assert_eq!(result.grouped.get("repoA").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_without_user_is_unknown() {
        let server = MockServer::start().await;
        let mut item = search_item(&server, 1);
        item.as_object_mut().unwrap().remove("user");
        mount_search(&server, 1, vec![item]).await;
        mount_detail(&server, 1, ResponseTemplate::new(404)).await;

        let result = aggregate_with(&client(&server), "alice", now()).await;
        let pr = &result.grouped.get("Unknown").unwrap()[0];
        assert_eq!(pr.opened_by.name, "Unknown");
        assert_eq!(pr.opened_by.avatar, "");
    }

    #[tokio::test]
    async fn test_deleted_fork_uses_fallback() {
        let server = MockServer::start().await;
        mount_search(&server, 1, vec![search_item(&server, 1)]).await;
        let mut body = detail(1, "repoA", "2025-06-14T12:00:00Z");
        body["head"]["repo"] = serde_json::Value::Null;
        mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(body)).await;

        let result = aggregate_with(&client(&server), "alice", now()).await;
        assert!(result.grouped.get("Unknown").is_some());
    }

    #[tokio::test]
    async fn test_slow_detail_times_out_to_fallback() {
        let server = MockServer::start().await;
        mount_search(&server, 2, vec![search_item(&server, 1), search_item(&server, 3)]).await;
        mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(detail(1, "repoA", "2025-06-14T12:00:00Z"))).await;
        mount_detail(
            &server,
            3,
            ResponseTemplate::new(200)
                .set_body_json(detail(3, "repoA", "2025-06-14T12:00:00Z"))
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let client = GitHubClient::new(&server.uri(), "t", Duration::from_secs(1)).unwrap();
        let result = aggregate_with(&client, "alice", now()).await;

        assert!(!result.failed);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.grouped.get("repoA").unwrap()[0].id, 101);
        let unknown = result.grouped.get("Unknown").unwrap();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].title, "Item 3");
        assert_eq!(unknown[0].created_at, "unknown");
    }

    #[tokio::test]
    async fn test_slow_search_times_out_to_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "total_count": 0, "items": [] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = GitHubClient::new(&server.uri(), "t", Duration::from_secs(1)).unwrap();
        let result = aggregate_with(&client, "alice", now()).await;

        assert!(result.configured);
        assert!(result.failed);
        assert!(result.grouped.is_empty());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_search_failure_is_total_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/issues"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = aggregate_with(&client(&server), "alice", now()).await;
        assert!(result.configured);
        assert!(result.failed);
        assert_eq!(result.total_count, 0);
        assert!(result.grouped.is_empty());
        assert!(result.error.unwrap().starts_with("Failed to load pull requests"));
    }
}
