//! # PR Corpus Ingestion
//!
//! Offline builder that turns a repository's pull request history into the
//! NDJSON corpus served by `pr-context-server`.
//!
//! ```text
//! repo URL ──► GitHub listing (paged) ──► files + comments per PR
//!                                              │
//!                                              ▼
//!                         build_text ──► EmbeddingProvider ──► CorpusWriter
//! ```
//!
//! Runs strictly in sequence, one PR at a time, so upstream rate limits are
//! respected and the output order matches the fetch order.

pub mod builder;
pub mod github;

use std::path::PathBuf;
use std::time::Duration;

use pr_context_corpus::{PrContextError, RepoScope, Result};
use pr_context_embeddings::EmbeddingProvider;
use tracing::info;

pub use builder::{CorpusBuilder, DEFAULT_MAX_PRS, DEFAULT_OUTPUT, IngestReport};
pub use github::{GitHubClient, PullRequestSource};

/// Inputs of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub repo_url: String,
    pub token: Option<String>,
    pub output: PathBuf,
    pub max_prs: usize,
    pub api_base_url: Option<String>,
    pub embed_timeout: Duration,
}

impl IngestOptions {
    pub fn new(repo_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            token,
            output: PathBuf::from(DEFAULT_OUTPUT),
            max_prs: DEFAULT_MAX_PRS,
            api_base_url: None,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Validate preconditions, then build the corpus from GitHub.
///
/// The URL and both credentials are checked before any network call.
pub async fn run_ingest(
    options: &IngestOptions,
    provider: &dyn EmbeddingProvider,
) -> Result<IngestReport> {
    let (scope, token) = check_preconditions(options, provider)?;

    let mut client = GitHubClient::new(&scope, token);
    if let Some(api_base) = &options.api_base_url {
        client = client.with_api_base(api_base.as_str());
    }
    info!("Using GitHub API at {}", client.api_base());

    CorpusBuilder::new(&client, provider)
        .with_max_prs(options.max_prs)
        .with_embed_timeout(options.embed_timeout)
        .build(&scope, &options.output)
        .await
}

fn check_preconditions(
    options: &IngestOptions,
    provider: &dyn EmbeddingProvider,
) -> Result<(RepoScope, String)> {
    let scope = RepoScope::parse_required(&options.repo_url)?;
    let token = options
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PrContextError::Precondition("missing GitHub access token".to_string()))?;
    if !provider.is_available() {
        return Err(PrContextError::Precondition(format!(
            "embedding provider {} is not configured",
            provider.name()
        )));
    }
    Ok((scope, token.to_string()))
}
