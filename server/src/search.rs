//! The `search` operation shared by every transport.
//!
//! A query is scoped to one repository by its URL, embedded with the same
//! canonical text as corpus records, and ranked against the loaded corpus.
//! Failures come back as [`PrContextError`] values; the adapters turn them
//! into tool results instead of transport faults.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pr_context_corpus::{
    CorpusStore, DEFAULT_TOP_K, PrComment, PrContextError, PrRecord, RepoScope, Result,
    build_text,
};
use pr_context_embeddings::{EmbeddingProvider, EmbeddingRequest, embed_with_timeout};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Input of one search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchQuery {
    /// Any URL inside the repository, usually the PR being reviewed.
    pub url: String,
    pub title: String,
    pub body: String,
    /// Changed file paths, in diff order.
    pub files: Vec<String>,
}

/// A comment as echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub filename: Option<String>,
}

/// A matching historical PR. Diffs and embeddings are never included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPr {
    pub url: String,
    pub title: String,
    pub body: String,
    pub comments: Vec<CommentView>,
}

impl From<&PrComment> for CommentView {
    fn from(comment: &PrComment) -> Self {
        Self {
            body: comment.body.clone(),
            author: comment.author.clone(),
            created_at: comment.created_at,
            filename: comment.filename.clone(),
        }
    }
}

impl From<&PrRecord> for SimilarPr {
    fn from(record: &PrRecord) -> Self {
        Self {
            url: record.url(),
            title: record.title.clone(),
            body: record.body.clone(),
            comments: record.comments.iter().map(CommentView::from).collect(),
        }
    }
}

/// Similar-PR search over an immutable corpus.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<CorpusStore>,
    provider: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
    top_k: usize,
}

impl SearchService {
    pub fn new(store: Arc<CorpusStore>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            embed_timeout: Duration::from_secs(30),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Deadline for the query embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Number of results returned per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Find the PRs most similar to `query` in the query's repository.
    ///
    /// An unparseable URL is [`PrContextError::MalformedInput`]; provider and
    /// ranking failures keep their own kinds.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SimilarPr>> {
        let scope = RepoScope::parse(&query.url)
            .ok_or_else(|| PrContextError::MalformedInput(query.url.clone()))?;

        let text = build_text(&query.title, &query.body, &query.files);
        let response = embed_with_timeout(
            self.provider.as_ref(),
            EmbeddingRequest::new(text),
            self.embed_timeout,
        )
        .await?;

        let ranked = self.store.rank(&response.embedding, &scope, self.top_k)?;
        debug!(
            "Search in {scope} matched {} PRs: {:?}",
            ranked.len(),
            ranked
                .iter()
                .map(|s| (s.record.pr_id, s.score))
                .collect::<Vec<_>>()
        );

        Ok(ranked.into_iter().map(|s| SimilarPr::from(s.record)).collect())
    }
}

/// Text returned to a tool caller: the JSON array on success, a short error
/// otherwise.
pub fn render_outcome(result: &Result<Vec<SimilarPr>>) -> std::result::Result<String, String> {
    match result {
        Ok(matches) => serde_json::to_string(matches).map_err(|e| format!("search failed: {e}")),
        Err(PrContextError::MalformedInput(url)) => Err(format!(
            "invalid url: expected scheme://host/org/repo, got {url:?}"
        )),
        Err(e) => {
            warn!("Search failed: {e}");
            Err(format!("search failed: {e}"))
        }
    }
}

/// Split a comma-joined file list, dropping blanks.
pub fn split_files(files: &str) -> Vec<String> {
    files
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pr_context_corpus::ErrorKind;
    use pr_context_embeddings::{EmbeddingError, EmbeddingResponse};
    use pretty_assertions::assert_eq;

    /// Returns a fixed vector, or fails, or never answers.
    enum StubProvider {
        Fixed(Vec<f32>),
        Failing,
        Hanging,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn default_model(&self) -> &str {
            "stub"
        }

        async fn embed(
            &self,
            _request: EmbeddingRequest,
        ) -> pr_context_embeddings::Result<EmbeddingResponse> {
            match self {
                Self::Fixed(embedding) => Ok(EmbeddingResponse {
                    embedding: embedding.clone(),
                    model: "stub".to_string(),
                    dimension: embedding.len(),
                    tokens_used: None,
                }),
                Self::Failing => Err(EmbeddingError::RateLimited {
                    retry_after_secs: 20,
                }),
                Self::Hanging => {
                    std::future::pending::<()>().await;
                    Err(EmbeddingError::ProviderNotConfigured)
                }
            }
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn record(org: &str, pr_id: u64, embedding: Vec<f32>) -> PrRecord {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        PrRecord {
            domain: "github.com".to_string(),
            org: org.to_string(),
            repo: "widgets".to_string(),
            pr_id,
            title: format!("PR {pr_id}"),
            body: "details".to_string(),
            author: "octocat".to_string(),
            created_at,
            merged: true,
            merged_at: Some(created_at),
            state: "closed".to_string(),
            comments: vec![PrComment {
                domain: "github.com".to_string(),
                org: org.to_string(),
                repo: "widgets".to_string(),
                pr_id,
                body: "please add a test".to_string(),
                author: Some("reviewer".to_string()),
                created_at,
                line: Some(10),
                filename: Some("src/lib.rs".to_string()),
            }],
            files: Vec::new(),
            embedding,
            text: format!("Title: PR {pr_id}\nBody: details"),
        }
    }

    fn service(provider: StubProvider) -> SearchService {
        let store = CorpusStore::from_records(vec![
            record("acme", 1, vec![1.0, 0.0]),
            record("acme", 2, vec![0.0, 1.0]),
            record("other", 3, vec![1.0, 0.0]),
        ])
        .unwrap();
        SearchService::new(Arc::new(store), Arc::new(provider))
    }

    fn query(url: &str) -> SearchQuery {
        SearchQuery {
            url: url.to_string(),
            title: "Fix cache".to_string(),
            body: String::new(),
            files: vec!["src/cache.rs".to_string()],
        }
    }

    #[tokio::test]
    async fn test_search_maps_records_in_scope() {
        let svc = service(StubProvider::Fixed(vec![1.0, 0.0]));
        let matches = svc
            .search(&query("https://github.com/acme/widgets/pull/99"))
            .await
            .unwrap();

        let urls: Vec<&str> = matches.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://github.com/acme/widgets/pull/1",
                "https://github.com/acme/widgets/pull/2",
            ]
        );
        assert_eq!(
            matches[0].comments,
            vec![CommentView {
                body: "please add a test".to_string(),
                author: Some("reviewer".to_string()),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                filename: Some("src/lib.rs".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_payload_omits_diffs_and_embeddings() {
        let svc = service(StubProvider::Fixed(vec![1.0, 0.0]));
        let result = svc
            .search(&query("https://github.com/acme/widgets.git"))
            .await;
        let payload = render_outcome(&result).unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        let first = &value[0];
        assert_eq!(first["url"], "https://github.com/acme/widgets/pull/1");
        assert_eq!(first["title"], "PR 1");
        assert!(first.get("embedding").is_none());
        assert!(first.get("files").is_none());
        assert!(first["comments"][0].get("line").is_none());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let svc = service(StubProvider::Fixed(vec![1.0, 0.0]));
        let result = svc.search(&query("https://github.com/acme")).await;

        assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::MalformedInput);
        let message = render_outcome(&result).unwrap_err();
        assert!(message.starts_with("invalid url"), "{message}");
    }

    #[tokio::test]
    async fn test_provider_failure_is_search_failed() {
        let svc = service(StubProvider::Failing);
        let result = svc
            .search(&query("https://github.com/acme/widgets"))
            .await;

        assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::Embedding);
        let message = render_outcome(&result).unwrap_err();
        assert!(message.starts_with("search failed"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let svc = service(StubProvider::Hanging).with_embed_timeout(Duration::from_secs(2));
        let result = svc
            .search(&query("https://github.com/acme/widgets"))
            .await;

        assert_eq!(result.as_ref().unwrap_err().kind(), ErrorKind::Embedding);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_search_failed() {
        let svc = service(StubProvider::Fixed(vec![1.0, 0.0, 0.0]));
        let result = svc
            .search(&query("https://github.com/acme/widgets"))
            .await;

        let message = render_outcome(&result).unwrap_err();
        assert!(message.starts_with("search failed"), "{message}");
    }

    #[tokio::test]
    async fn test_top_k_and_unknown_scope() {
        let svc = service(StubProvider::Fixed(vec![1.0, 0.0])).with_top_k(1);
        let matches = svc
            .search(&query("https://github.com/acme/widgets"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);

        let matches = svc
            .search(&query("https://github.com/nobody/widgets"))
            .await
            .unwrap();
        assert_eq!(render_outcome(&Ok(matches)).unwrap(), "[]");
    }

    #[test]
    fn test_split_files() {
        assert_eq!(
            split_files("src/a.rs, src/b.rs,,README.md "),
            vec!["src/a.rs", "src/b.rs", "README.md"]
        );
        assert!(split_files("").is_empty());
    }
}
