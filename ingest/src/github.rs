//! GitHub REST client for pull request history.
//!
//! Works against github.com and GitHub Enterprise Server; the API base is
//! derived from the repository host unless overridden.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pr_context_corpus::{PrContextError, RepoScope, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Largest page size the GitHub API accepts.
pub const MAX_PER_PAGE: u32 = 100;

const USER_AGENT: &str = concat!("pr-context-ingest/", env!("CARGO_PKG_VERSION"));

/// Account reference attached to PRs and comments.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// One entry of the pull request listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

/// One changed file of a pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    #[serde(default)]
    pub patch: Option<String>,
}

/// A review comment anchored to the diff.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    pub created_at: DateTime<Utc>,
    pub path: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub original_line: Option<u32>,
}

/// A general conversation comment on the pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    pub created_at: DateTime<Utc>,
}

/// Read access to a repository's pull request history.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// One page of the pull request listing, newest first. `page` is 1-based.
    async fn list_pull_requests(
        &self,
        scope: &RepoScope,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequestSummary>>;

    /// All changed files of a pull request.
    async fn list_files(&self, scope: &RepoScope, number: u64) -> Result<Vec<PullRequestFile>>;

    /// All diff-anchored review comments of a pull request.
    async fn list_review_comments(
        &self,
        scope: &RepoScope,
        number: u64,
    ) -> Result<Vec<ReviewComment>>;

    /// All general comments of a pull request.
    async fn list_issue_comments(
        &self,
        scope: &RepoScope,
        number: u64,
    ) -> Result<Vec<IssueComment>>;
}

/// Token-authenticated GitHub REST API client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl GitHubClient {
    /// Create a client for the host in `scope`.
    pub fn new(scope: &RepoScope, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base_for_host(&scope.domain),
            token: token.into(),
        }
    }

    /// Override the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        page: u32,
        per_page: u32,
    ) -> Result<Vec<T>> {
        let url = format!("{}{path}", self.api_base);
        debug!("GET {url} page={page}");

        let page = page.to_string();
        let per_page = per_page.to_string();
        let response = self
            .client
            .get(&url)
            .query(extra)
            .query(&[("per_page", per_page.as_str()), ("page", page.as_str())])
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| PrContextError::UpstreamFetch(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PrContextError::UpstreamFetch(format!(
                "GET {url} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PrContextError::UpstreamFetch(format!("GET {url}: invalid body: {e}")))
    }

    /// Fetch every page of a listing until a short page.
    async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<T> = self.get_page(path, &[], page, MAX_PER_PAGE).await?;
            let done = batch.len() < MAX_PER_PAGE as usize;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_pull_requests(
        &self,
        scope: &RepoScope,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PullRequestSummary>> {
        let path = format!("/repos/{}/{}/pulls", scope.org, scope.repo);
        self.get_page(&path, &[("state", "all")], page, per_page.clamp(1, MAX_PER_PAGE))
            .await
    }

    async fn list_files(&self, scope: &RepoScope, number: u64) -> Result<Vec<PullRequestFile>> {
        self.get_all(&format!(
            "/repos/{}/{}/pulls/{number}/files",
            scope.org, scope.repo
        ))
        .await
    }

    async fn list_review_comments(
        &self,
        scope: &RepoScope,
        number: u64,
    ) -> Result<Vec<ReviewComment>> {
        self.get_all(&format!(
            "/repos/{}/{}/pulls/{number}/comments",
            scope.org, scope.repo
        ))
        .await
    }

    async fn list_issue_comments(
        &self,
        scope: &RepoScope,
        number: u64,
    ) -> Result<Vec<IssueComment>> {
        self.get_all(&format!(
            "/repos/{}/{}/issues/{number}/comments",
            scope.org, scope.repo
        ))
        .await
    }
}

/// REST base URL for a GitHub host.
pub fn api_base_for_host(host: &str) -> String {
    if host.eq_ignore_ascii_case("github.com") || host.eq_ignore_ascii_case("www.github.com") {
        "https://api.github.com".to_string()
    } else {
        format!("https://{host}/api/v3")
    }
}
